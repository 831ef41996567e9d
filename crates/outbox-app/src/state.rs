// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::EntityKind;

/// Exactly one of these holds at any time; a modal cannot exist
/// without the entity list it was opened from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Listing(EntityKind),
    Editing { entity: EntityKind, record_id: i64 },
    Creating(EntityKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: Mode,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: Mode::Idle,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    SelectEntity(EntityKind),
    NextEntity,
    PrevEntity,
    OpenEditor { record_id: i64 },
    OpenCreator,
    CloseModal,
    FormSubmitted,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(Mode),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    /// Applies one command. Transitions that make no sense in the
    /// current mode return no events and change nothing.
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::SelectEntity(entity) => match self.mode {
                Mode::Editing { .. } | Mode::Creating(_) => vec![],
                _ => self.enter(Mode::Listing(entity)),
            },
            AppCommand::NextEntity => self.rotate_entity(1),
            AppCommand::PrevEntity => self.rotate_entity(-1),
            AppCommand::OpenEditor { record_id } => match self.mode {
                Mode::Listing(entity) => self.enter(Mode::Editing { entity, record_id }),
                _ => vec![],
            },
            AppCommand::OpenCreator => match self.mode {
                Mode::Listing(entity) => self.enter(Mode::Creating(entity)),
                _ => vec![],
            },
            AppCommand::CloseModal | AppCommand::FormSubmitted => match self.mode {
                Mode::Editing { entity, .. } | Mode::Creating(entity) => {
                    self.enter(Mode::Listing(entity))
                }
                _ => vec![],
            },
            AppCommand::SetStatus(message) => {
                self.status_line = Some(message.clone());
                vec![AppEvent::StatusUpdated(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub const fn active_entity(&self) -> Option<EntityKind> {
        match self.mode {
            Mode::Idle => None,
            Mode::Listing(entity)
            | Mode::Editing { entity, .. }
            | Mode::Creating(entity) => Some(entity),
        }
    }

    pub const fn modal_open(&self) -> bool {
        matches!(self.mode, Mode::Editing { .. } | Mode::Creating(_))
    }

    fn enter(&mut self, mode: Mode) -> Vec<AppEvent> {
        self.mode = mode;
        vec![AppEvent::ModeChanged(self.mode)]
    }

    fn rotate_entity(&mut self, delta: isize) -> Vec<AppEvent> {
        let entities = EntityKind::ALL;
        match self.mode {
            Mode::Editing { .. } | Mode::Creating(_) => vec![],
            Mode::Idle => self.enter(Mode::Listing(entities[0])),
            Mode::Listing(current) => {
                let position = entities
                    .iter()
                    .position(|entity| *entity == current)
                    .unwrap_or(0) as isize;
                let len = entities.len() as isize;
                let next = (position + delta).rem_euclid(len) as usize;
                self.enter(Mode::Listing(entities[next]))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, Mode};
    use crate::EntityKind;

    #[test]
    fn entity_rotation_wraps() {
        let mut state = AppState {
            mode: Mode::Listing(EntityKind::Emails),
            ..AppState::default()
        };

        let events = state.dispatch(AppCommand::NextEntity);
        assert_eq!(state.mode, Mode::Listing(EntityKind::Statuses));
        assert_eq!(
            events,
            vec![AppEvent::ModeChanged(Mode::Listing(EntityKind::Statuses))],
        );

        state.dispatch(AppCommand::PrevEntity);
        assert_eq!(state.mode, Mode::Listing(EntityKind::Emails));
    }

    #[test]
    fn rotation_from_idle_selects_first_entity() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::NextEntity);
        assert_eq!(state.mode, Mode::Listing(EntityKind::Statuses));
    }

    #[test]
    fn editor_opens_only_from_a_listing() {
        let mut state = AppState::default();
        assert!(state.dispatch(AppCommand::OpenEditor { record_id: 3 }).is_empty());
        assert_eq!(state.mode, Mode::Idle);

        state.dispatch(AppCommand::SelectEntity(EntityKind::Tasks));
        state.dispatch(AppCommand::OpenEditor { record_id: 3 });
        assert_eq!(
            state.mode,
            Mode::Editing {
                entity: EntityKind::Tasks,
                record_id: 3,
            },
        );
    }

    #[test]
    fn modal_blocks_entity_switching() {
        let mut state = AppState {
            mode: Mode::Creating(EntityKind::Recipients),
            ..AppState::default()
        };

        assert!(state.dispatch(AppCommand::NextEntity).is_empty());
        assert!(state
            .dispatch(AppCommand::SelectEntity(EntityKind::Tasks))
            .is_empty());
        assert!(state.dispatch(AppCommand::OpenCreator).is_empty());
        assert_eq!(state.mode, Mode::Creating(EntityKind::Recipients));
    }

    #[test]
    fn close_and_submit_return_to_the_listing() {
        let mut state = AppState {
            mode: Mode::Editing {
                entity: EntityKind::Emails,
                record_id: 9,
            },
            ..AppState::default()
        };

        state.dispatch(AppCommand::CloseModal);
        assert_eq!(state.mode, Mode::Listing(EntityKind::Emails));

        state.dispatch(AppCommand::OpenCreator);
        state.dispatch(AppCommand::FormSubmitted);
        assert_eq!(state.mode, Mode::Listing(EntityKind::Emails));
    }

    #[test]
    fn status_line_round_trips_through_set_and_clear() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::SetStatus("recipient saved".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("recipient saved"));
        assert_eq!(
            events,
            vec![AppEvent::StatusUpdated("recipient saved".to_owned())],
        );

        let events = state.dispatch(AppCommand::ClearStatus);
        assert_eq!(state.status_line, None);
        assert_eq!(events, vec![AppEvent::StatusCleared]);
    }
}

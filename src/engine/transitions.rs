use crate::error::AppError;
use crate::models::event::MissionAction;
use crate::models::mission::MissionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Assign,
    Accept,
    Start,
    Complete,
    Cancel,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Assign => "assign",
            Transition::Accept => "accept",
            Transition::Start => "start",
            Transition::Complete => "complete",
            Transition::Cancel => "cancel",
        }
    }

    pub fn action(self) -> MissionAction {
        match self {
            Transition::Assign => MissionAction::Assigned,
            Transition::Accept => MissionAction::Accepted,
            Transition::Start => MissionAction::Started,
            Transition::Complete => MissionAction::Completed,
            Transition::Cancel => MissionAction::Cancelled,
        }
    }

    pub fn releases_driver(self) -> bool {
        matches!(self, Transition::Complete | Transition::Cancel)
    }
}

pub fn next_status(from: MissionStatus, transition: Transition) -> Option<MissionStatus> {
    use MissionStatus::*;

    match (from, transition) {
        (Pending, Transition::Assign) => Some(Assigned),
        (Assigned, Transition::Accept) => Some(Accepted),
        (Assigned | Accepted, Transition::Start) => Some(InProgress),
        (InProgress, Transition::Complete) => Some(Completed),
        (Pending | Assigned | Accepted | InProgress, Transition::Cancel) => Some(Cancelled),
        _ => None,
    }
}

pub fn apply(from: MissionStatus, transition: Transition) -> Result<MissionStatus, AppError> {
    next_status(from, transition).ok_or_else(|| {
        AppError::Conflict(format!(
            "cannot {} a mission that is {}",
            transition.as_str(),
            from
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::{apply, next_status, Transition};
    use crate::error::AppError;
    use crate::models::mission::MissionStatus;

    #[test]
    fn happy_path_reaches_completed() {
        let mut status = MissionStatus::Pending;
        for transition in [
            Transition::Assign,
            Transition::Accept,
            Transition::Start,
            Transition::Complete,
        ] {
            status = apply(status, transition).unwrap();
        }
        assert_eq!(status, MissionStatus::Completed);
    }

    #[test]
    fn start_may_skip_acceptance() {
        assert_eq!(
            next_status(MissionStatus::Assigned, Transition::Start),
            Some(MissionStatus::InProgress)
        );
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in [MissionStatus::Completed, MissionStatus::Cancelled] {
            for transition in [
                Transition::Assign,
                Transition::Accept,
                Transition::Start,
                Transition::Complete,
                Transition::Cancel,
            ] {
                assert!(matches!(apply(from, transition), Err(AppError::Conflict(_))));
            }
        }
    }

    #[test]
    fn every_non_terminal_state_can_be_cancelled() {
        for from in MissionStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert_eq!(
                next_status(from, Transition::Cancel),
                Some(MissionStatus::Cancelled)
            );
        }
    }

    #[test]
    fn assignment_only_from_pending() {
        for from in MissionStatus::ALL
            .into_iter()
            .filter(|s| *s != MissionStatus::Pending)
        {
            assert_eq!(next_status(from, Transition::Assign), None);
        }
    }

    #[test]
    fn cannot_complete_before_starting() {
        assert_eq!(next_status(MissionStatus::Assigned, Transition::Complete), None);
        assert_eq!(next_status(MissionStatus::Pending, Transition::Complete), None);
    }
}

use serde::{Deserialize, Serialize};

/// Where a tab is in its deferred restore.
///
/// Stages only move forward. Each content event consumes its own stage; an
/// event that arrives while an earlier stage is still pending consumes (and
/// drops) that stage too, so no restoration can ever run twice or run after
/// a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreState {
    /// Nothing to restore; ordinary capture applies.
    #[default]
    Done,
    /// Delay-loaded: the host tab exists but has no content yet.
    PendingFull,
    /// History replayed; waiting for the location change to set the zoom.
    HistoryArmed,
    /// Zoom handled; waiting for the load to replay form data.
    ContentLoaded,
    /// Form data handled; waiting for the page show to replay scroll.
    ShowReady,
}

/// Restorations a content event is allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageActions {
    pub zoom: bool,
    pub form_data: bool,
    pub scroll: bool,
}

impl RestoreState {
    fn rank(self) -> u8 {
        match self {
            RestoreState::Done => 4,
            RestoreState::PendingFull => 0,
            RestoreState::HistoryArmed => 1,
            RestoreState::ContentLoaded => 2,
            RestoreState::ShowReady => 3,
        }
    }

    /// Arms all three content stages at once.
    pub fn arm(&mut self) {
        *self = RestoreState::HistoryArmed;
    }

    /// True while form data or scroll positions are still to be replayed,
    /// which means captures would clobber the saved values.
    pub fn is_restoring_content(self) -> bool {
        matches!(
            self,
            RestoreState::HistoryArmed | RestoreState::ContentLoaded | RestoreState::ShowReady
        )
    }

    /// Advances past `stage` (which must be one of the three content
    /// stages). Returns `true` when `stage` itself was still pending.
    fn consume(&mut self, stage: RestoreState) -> bool {
        if *self == RestoreState::PendingFull || self.rank() > stage.rank() {
            return false;
        }
        *self = match stage {
            RestoreState::HistoryArmed => RestoreState::ContentLoaded,
            RestoreState::ContentLoaded => RestoreState::ShowReady,
            _ => RestoreState::Done,
        };
        true
    }

    pub fn on_location_change(&mut self) -> StageActions {
        StageActions {
            zoom: self.consume(RestoreState::HistoryArmed),
            ..StageActions::default()
        }
    }

    pub fn on_load(&mut self) -> StageActions {
        let form_data = self.consume(RestoreState::ContentLoaded);
        StageActions {
            form_data,
            ..StageActions::default()
        }
    }

    pub fn on_page_show(&mut self) -> StageActions {
        StageActions {
            scroll: self.consume(RestoreState::ShowReady),
            ..StageActions::default()
        }
    }
}

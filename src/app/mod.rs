use crate::model::InstanceRecord;
use crate::services::dispatch::UpdateMessage;
use crate::services::poller::Diagnostic;
use crate::ui::AppState;

pub enum AppMsg {
    UpdateArrived(UpdateMessage),
    PollerDiag(Diagnostic),
}

pub enum Effect {
    ShowStatus { text: String },
    OpenDetail { record: InstanceRecord },
    OptionSelected { label: String },
    SwitchPage { name: String },
    NavBack,
    ShowHelp,
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    match msg {
        AppMsg::UpdateArrived(update) => {
            let kind = update.kind();
            let applied = state.apply_update(update.into_payload());
            state.dbg(format!("update: {kind:?} ({applied} items)"));
            Vec::new()
        }
        AppMsg::PollerDiag(diag) => {
            // Transport failures stay out of the page flow; operators see
            // them in the debug log and the log sink.
            state.dbg(format!("poller {}: {}", diag.source, diag.message));
            Vec::new()
        }
    }
}

//! Internal messages between the public game handle and its command loop.

use crate::commands::GameCommand;
use crate::game::errors::GameError;
use tokio::sync::oneshot;

/// One in-flight command: the instruction plus the channel the loop answers
/// on. `issue_command` blocks on the reply, which is what makes command
/// processing synchronous for callers.
#[derive(Debug)]
pub(crate) struct CommandSession {
    pub command: GameCommand,
    pub reply: oneshot::Sender<Result<(), GameError>>,
}

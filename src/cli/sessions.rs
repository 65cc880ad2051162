//! Saved session commands.

use serde_json::json;

use crate::cli::args::SessionsCommand;
use crate::cli::context::AppContext;
use crate::cli::emit;
use crate::error::{LmcError, Result};
use crate::render;

/// Execute a sessions subcommand.
///
/// # Errors
///
/// Returns an error for unknown ids or a store that cannot be read or
/// written.
pub fn execute(ctx: &AppContext, cmd: &SessionsCommand) -> Result<()> {
    let (format, pretty, no_color) = (ctx.format(), ctx.pretty(), ctx.no_color());
    match cmd {
        SessionsCommand::List { limit } => {
            let store = ctx.session_store()?;
            let mut sessions = store.list();
            if let Some(limit) = limit {
                sessions.truncate(*limit);
            }
            print!("{}", render::render_sessions(&sessions, format, pretty, no_color)?);
            Ok(())
        }
        SessionsCommand::Show { id } => {
            let store = ctx.session_store()?;
            let session = store.get(*id).ok_or_else(|| not_found(*id))?;
            print!("{}", render::render_session(session, format, pretty, no_color)?);
            Ok(())
        }
        SessionsCommand::Delete { id } => {
            let mut store = ctx.session_store()?;
            if !store.delete(*id)? {
                return Err(not_found(*id));
            }
            let data = json!({ "id": id, "deleted": true });
            emit(ctx, "sessions delete", &data, |_, _| format!("Deleted session {id}\n"))
        }
        SessionsCommand::Search { term } => {
            let store = ctx.session_store()?;
            let sessions = store.search(term);
            print!("{}", render::render_sessions(&sessions, format, pretty, no_color)?);
            Ok(())
        }
    }
}

fn not_found(id: u64) -> LmcError {
    LmcError::NotFound {
        what: "session".to_string(),
        id: id.to_string(),
    }
}

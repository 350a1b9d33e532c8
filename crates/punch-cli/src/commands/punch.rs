use punch_core::clock::{SessionClock, Transition};
use punch_core::config::AutoSyncAction;
use punch_core::util::{now, TIME_FORMAT};
use punch_core::Session;

use crate::cli::PunchArgs;
use crate::commands::common::{resolve_time_arg, Context};
use crate::error::CliError;

pub fn run_start(ctx: &Context, time: Option<&str>, args: &PunchArgs) -> Result<(), CliError> {
    let client = ctx.resolve_client(args.client.as_deref())?;
    let at = resolve_time_arg(ctx, time, &client)?;

    let store = ctx.sessions();
    let session = SessionClock::new(&store).start(&client, at, &args.message)?;
    println!("{}", describe_transition(&session, Transition::Started));

    ctx.autosync(AutoSyncAction::Start)
}

pub fn run_end(ctx: &Context, time: Option<&str>, args: &PunchArgs) -> Result<(), CliError> {
    let client = ctx.resolve_client(args.client.as_deref())?;
    let at = resolve_time_arg(ctx, time, &client)?;

    let store = ctx.sessions();
    let session = SessionClock::new(&store).end_open(&client, at, &args.message)?;
    println!("{}", describe_transition(&session, Transition::Ended));

    ctx.autosync(AutoSyncAction::End)
}

pub fn run_toggle(ctx: &Context, args: &PunchArgs) -> Result<(), CliError> {
    let client = ctx.resolve_client(args.client.as_deref())?;

    let store = ctx.sessions();
    let (session, transition) = SessionClock::new(&store).toggle_at(&client, now(), &args.message)?;
    println!("{}", describe_transition(&session, transition));

    ctx.autosync(match transition {
        Transition::Started => AutoSyncAction::Start,
        Transition::Ended => AutoSyncAction::End,
    })
}

pub fn describe_transition(session: &Session, transition: Transition) -> String {
    match transition {
        Transition::Started => format!(
            "Clocked in for {} at {}",
            session.client.name,
            session.start.format(TIME_FORMAT)
        ),
        Transition::Ended => {
            let end = session
                .end
                .map_or_else(String::new, |end| end.format(TIME_FORMAT).to_string());
            format!(
                "Clocked out of {} at {} after {} ({:.2} {})",
                session.client.name,
                end,
                session.duration(),
                session.earnings().unwrap_or_default(),
                session.client.currency
            )
        }
    }
}

use std::path::Path;

use chrono::{Datelike, NaiveDateTime};
use punch_core::export::render_sessions;
use punch_core::query::{resolve_time, SessionQuery, Timeframe};
use punch_core::util::now;

use crate::cli::{ReportArgs, TimeframeArgs};
use crate::commands::common::Context;
use crate::error::CliError;

pub fn run_report(ctx: &Context, args: &ReportArgs) -> Result<(), CliError> {
    let now = now();
    let rendered = render_report(ctx, args, now)?;
    write_output(&rendered, args.output.as_deref())
}

pub fn render_report(
    ctx: &Context,
    args: &ReportArgs,
    now: NaiveDateTime,
) -> Result<String, CliError> {
    let timeframe = resolve_timeframe(ctx, &args.timeframe, args.client.as_deref(), now)?;
    let store = ctx.sessions();
    let sessions = SessionQuery::new(timeframe)
        .for_client(args.client.clone())
        .descending(args.desc)
        .run(&store, now)?;

    Ok(render_sessions(&sessions, args.format.into(), args.verbose)?)
}

pub fn resolve_timeframe(
    ctx: &Context,
    args: &TimeframeArgs,
    client: Option<&str>,
    now: NaiveDateTime,
) -> Result<Timeframe, CliError> {
    if args.week {
        return Ok(Timeframe::Week);
    }
    if let Some(month) = args.month {
        return Ok(Timeframe::month(month.unwrap_or_else(|| now.month()))?);
    }
    if let Some(year) = args.year {
        return Ok(Timeframe::year(year.unwrap_or_else(|| now.year()), now)?);
    }
    if args.all {
        return Ok(Timeframe::All);
    }
    if let Some(since) = args.since.as_deref() {
        let since = resolve_time(since, now, &ctx.sessions(), client)?;
        return Ok(Timeframe::Since(since));
    }
    Ok(Timeframe::Day)
}

fn write_output(rendered: &str, output_path: Option<&Path>) -> Result<(), CliError> {
    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        print!("{rendered}");
        if !rendered.ends_with('\n') {
            println!();
        }
    }
    Ok(())
}

//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use safeflow_config::DescriptionSummary;
use safeflow_engine::{OutputEvent, StepReport, Timestamp};
use serde::Serialize;
use serde_json::json;

/// Print error in JSON format
pub fn print_error_json(error: &Error, code: u8) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "exit_code": code,
        }
    });
    print_pretty(&error_json);
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print the result of a successful validation.
pub fn print_summary(name: Option<&str>, summary: &DescriptionSummary, json: bool) {
    if json {
        print_pretty(&json!({
            "success": true,
            "name": name,
            "summary": summary,
        }));
        return;
    }

    println!(
        "{} {}",
        "✓".green(),
        match name {
            Some(name) => format!("Engine description '{}' is valid", name.bold()),
            None => "Engine description is valid".to_string(),
        }
    );
    let rows = [
        ("Signals", summary.signals),
        ("Merges", summary.merges),
        ("Remaps", summary.remaps),
        ("Scales", summary.scales),
        ("Fault monitors", summary.fault_monitors),
        ("Limp actions", summary.limp_actions),
        ("PID controllers", summary.pids),
        ("Verified outputs", summary.verified_outputs),
        ("Cyclic outputs", summary.cyclic_outputs),
    ];
    for (label, count) in rows {
        println!("  {label}: {count}");
    }
}

/// One output event, tagged with the step that produced it.
#[derive(Debug, Serialize)]
pub struct EmittedOutput {
    pub step_us: Timestamp,
    #[serde(flatten)]
    pub event: OutputEvent,
}

/// Print one output event as it is produced.
pub fn print_output_human(output: &EmittedOutput) {
    let e = &output.event;
    println!(
        "{} {}:{:#x} dev {} value {} {}",
        format!("[{:>10} us]", output.step_us).dimmed(),
        e.kind.to_string().cyan(),
        e.target_id,
        e.device_index,
        e.value.to_string().bold(),
        format!("flags {:#x}", e.flags).dimmed(),
    );
}

/// Print the end-of-run report.
pub fn print_run_result(steps: u64, outputs: &[EmittedOutput], totals: &StepReport, json: bool) {
    if json {
        print_pretty(&json!({
            "success": true,
            "steps": steps,
            "outputs": outputs,
            "totals": totals,
        }));
        return;
    }

    println!();
    println!("{} {}", "Steps run:".bold(), steps);
    let rows = [
        ("Events ingested", totals.events_ingested),
        ("Events discarded", totals.events_discarded),
        ("Fast-path wakes", totals.fast_path_wakes),
        ("Monitor wakes", totals.monitor_wakes),
        ("Signals timed out", totals.signals_timed_out),
        ("Merges run", totals.merges_run),
        ("Merges without input", totals.merges_without_input),
        ("Monitor faults", totals.monitors_faulted),
        ("Limp entries", totals.limp_entries),
        ("Limp exits", totals.limp_exits),
        ("Outputs emitted", totals.outputs_emitted),
        ("Outputs dropped", totals.outputs_dropped),
        ("Verifications failed", totals.verifications_failed),
    ];
    for (label, count) in rows {
        if count > 0 && matches!(
            label,
            "Events discarded" | "Outputs dropped" | "Verifications failed"
        ) {
            println!("  {}: {}", label, count.to_string().yellow());
        } else {
            println!("  {label}: {count}");
        }
    }
}

fn print_pretty(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

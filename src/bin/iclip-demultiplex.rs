//! Upload multiplexed iCLIP reads, demultiplex them and file the samples into
//! collections named by their experiment.

use iclip_flow::classify::ClassificationReport;
use iclip_flow::cli::DemultiplexArgs;
use iclip_flow::pipeline::{self, DemultiplexOutcome};
use iclip_flow::remote::ResolweClient;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32, String> {
    let Some(args) = DemultiplexArgs::parse(std::env::args().skip(1).collect())? else {
        return Ok(0);
    };
    if let Err(err) = iclip_flow::logging::init() {
        eprintln!("Logging to file disabled: {err}");
    }
    let config = args.connection.load_config().map_err(|err| err.to_string())?;
    let client = ResolweClient::connect(&config.server.url, &config.credentials())
        .map_err(|err| err.to_string())?;

    let outcome = pipeline::run_demultiplex(&client, &config, &args.request)
        .map_err(|err| err.to_string())?;
    match &outcome {
        DemultiplexOutcome::PrimaryFailed { .. } => println!("Demultiplexing job failed"),
        DemultiplexOutcome::AnnotationFailed { .. } => {
            println!("Sample annotation failed. Could not assign samples to collection.")
        }
        DemultiplexOutcome::Classified { report, .. } => print_report(report),
    }
    Ok(outcome.exit_code())
}

fn print_report(report: &ClassificationReport) {
    for assignment in &report.assignments {
        println!(
            "Sample {} added to collection {}.",
            assignment.sample, assignment.collection_name
        );
    }
    for failure in &report.failures {
        let kind = if failure.reason.is_descriptor_problem() {
            "bad descriptor"
        } else {
            "server error"
        };
        println!(
            "Sample {} was not assigned to any collections ({kind}: {})",
            failure.sample, failure.reason
        );
    }
    for (collection, count) in report.counts_by_collection() {
        println!("Collection {collection}: {count} samples added.");
    }
    if report.assignments.is_empty() && report.failures.is_empty() {
        println!("No demultiplexed samples to assign.");
    }
}

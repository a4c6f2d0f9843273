//! Run iCount group analysis on samples of a working collection.

use iclip_flow::cli::GroupArgs;
use iclip_flow::pipeline;
use iclip_flow::remote::ResolweClient;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(args) = GroupArgs::parse(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = iclip_flow::logging::init() {
        eprintln!("Logging to file disabled: {err}");
    }
    let config = args.connection.load_config().map_err(|err| err.to_string())?;
    let client = ResolweClient::connect(&config.server.url, &config.credentials())
        .map_err(|err| err.to_string())?;

    let job = pipeline::run_group_analysis(&client, &config, &args.request)
        .map_err(|err| err.to_string())?;
    println!(
        "Submitted group analysis '{}' as job {}.",
        args.request.name, job.id
    );
    Ok(())
}

use std::path::PathBuf;

use anyhow::{anyhow, Context, Error};

use gradespec_exec::LocalProcessRunner;
use gradespec_format::spec::serialize_record;
use gradespec_format::ui::UIMessageSender;
use gradespec_format::{evaluate, EvaluationOptions, GradescopeResults, GraderConfig, Specification};

use crate::opt::Opt;

/// The name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "gradespec.yaml";

/// The configuration to use: the one passed explicitly, the one in the working directory or the
/// default one.
pub fn load_config(opt: &Opt) -> Result<GraderConfig, Error> {
    let path = match &opt.config {
        Some(path) => Some(path.clone()),
        None => Some(opt.workdir.join(CONFIG_FILE)).filter(|p| p.exists()),
    };
    match path {
        Some(path) => {
            debug!("Loading the configuration from {}", path.display());
            GraderConfig::from_file(&path)
        }
        None => Ok(GraderConfig::default()),
    }
}

/// The working directory as an absolute path, since the compilers run inside the scratch
/// directories.
pub fn absolute_workdir(opt: &Opt) -> Result<PathBuf, Error> {
    opt.workdir.canonicalize().with_context(|| {
        format!("Cannot access the working directory {}", opt.workdir.display())
    })
}

/// Run the checks as described by the command line options.
pub fn run(opt: Opt) -> Result<(), Error> {
    let workdir = absolute_workdir(&opt)?;
    let config = load_config(&opt)?;
    let mut spec = Specification::load(&opt.specs, &config.timeouts)?;
    spec.retain_numbers(&opt.filter);

    if opt.dump {
        for diagnostic in spec.diagnostics.diagnostics() {
            eprintln!("{}", diagnostic);
        }
        for record in spec.records() {
            print!("{}", serialize_record(record));
        }
        return Ok(());
    }

    let mut options = EvaluationOptions::new(workdir);
    if let Some(num_workers) = opt.num_workers {
        options.num_workers = num_workers;
    }
    options.keep_scratch = opt.keep_scratch;

    // setup the ui thread
    let (sender, receiver) = UIMessageSender::new();
    let ui_type = opt.ui;
    let ui_thread = std::thread::Builder::new()
        .name("UI".to_owned())
        .spawn(move || {
            let mut ui = ui_type.build();
            while let Ok(message) = receiver.recv() {
                ui.on_message(message);
            }
            ui.finish();
        })
        .context("Failed to spawn UI thread")?;

    for diagnostic in spec.diagnostics.diagnostics() {
        sender.send_diagnostic(diagnostic.clone())?;
    }
    let runner = LocalProcessRunner::new(config.output_limit);
    let report = evaluate(&spec, &config, &runner, &options, &sender);

    // wait for the UI to print everything
    drop(sender);
    ui_thread.join().map_err(|_| anyhow!("UI panicked"))?;
    let report = report?;

    let mut results = GradescopeResults::from_report(&report);
    if let Some(metadata) = &opt.submission_metadata {
        let content = std::fs::read_to_string(metadata).with_context(|| {
            format!("Cannot read the submission metadata {}", metadata.display())
        })?;
        results.keep_best_previous(&content)?;
    }
    if let Some(path) = &opt.results {
        results.write_to(path)?;
        info!("Results written to {}", path.display());
    }
    Ok(())
}


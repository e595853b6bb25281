use std::path::PathBuf;

use clap::{ArgAction, Parser};

use gradespec_format::ui::UIType;

#[derive(Parser, Debug, Clone)]
#[clap(
    name = "gradespec",
    version,
    about = "Run the checks of an annotated grading specification"
)]
pub struct Opt {
    /// The specification files to run, usually `tests_code.cpp`
    #[clap(required = true)]
    pub specs: Vec<PathBuf>,

    /// Directory with the sources of the submission
    #[clap(short = 'C', long = "workdir", default_value = ".")]
    pub workdir: PathBuf,

    /// YAML configuration of the grader
    ///
    /// When not specified, `gradespec.yaml` inside the working directory is used, if present.
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Where to write the Gradescope results.json
    #[clap(long)]
    pub results: Option<PathBuf>,

    /// The submission metadata, used to keep the best score among the previous submissions
    #[clap(long = "submission-metadata")]
    pub submission_metadata: Option<PathBuf>,

    /// Which UI to use, available UIs are: print, json, silent
    #[clap(long, default_value = "print")]
    pub ui: UIType,

    /// Number of checks to run at the same time
    #[clap(short = 'j', long = "num-workers")]
    pub num_workers: Option<usize>,

    /// Do not remove the scratch directories of the checks
    #[clap(long = "keep-scratch")]
    pub keep_scratch: bool,

    /// Run only the checks whose number starts with one of these
    #[clap(long, num_args = 1..)]
    pub filter: Vec<String>,

    /// Print the normalized checks in the annotation format, without running them
    #[clap(long)]
    pub dump: bool,

    #[clap(flatten)]
    pub logger: LoggerOpt,
}

#[derive(Parser, Debug, Clone)]
pub struct LoggerOpt {
    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl LoggerOpt {
    pub fn enable_log(&self) {
        if self.verbose > 0 {
            std::env::set_var("RUST_BACKTRACE", "1");
            match self.verbose {
                0 => unreachable!(),
                1 => std::env::set_var("RUST_LOG", "info"),
                2 => std::env::set_var("RUST_LOG", "debug"),
                _ => std::env::set_var("RUST_LOG", "trace"),
            }
        }

        env_logger::Builder::from_default_env()
            .format_timestamp_nanos()
            .init();
        better_panic::install();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_options() {
        let opt = Opt::try_parse_from([
            "gradespec",
            "-C",
            "submission",
            "--ui",
            "json",
            "-j",
            "3",
            "--filter",
            "1",
            "5.2",
            "-vv",
            "--",
            "tests_code.cpp",
        ])
        .unwrap();
        assert_eq!(opt.specs, vec![PathBuf::from("tests_code.cpp")]);
        assert_eq!(opt.workdir, PathBuf::from("submission"));
        assert_eq!(opt.ui, UIType::Json);
        assert_eq!(opt.num_workers, Some(3));
        assert_eq!(opt.filter, vec!["1".to_string(), "5.2".to_string()]);
        assert_eq!(opt.logger.verbose, 2);
        assert!(!opt.dump);
    }

    #[test]
    fn test_specs_are_required() {
        assert!(Opt::try_parse_from(["gradespec"]).is_err());
    }
}

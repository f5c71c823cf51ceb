//! On-disk workspace of one invocation.
//!
//! Everything under `workingvolume/logs` ships back with the job outputs,
//! which is why the compose document and the CSV summaries land there.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use strider_model::{Job, LOGS_DIR, VOLUME_DIR};

use crate::error::CoreResult;

/// Paths of the runner's working directory layout.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Host working directory the runner was launched in.
    pub working_dir: PathBuf,
    /// `workingvolume/` under the working directory; backs the job volume.
    pub volume_dir: PathBuf,
    /// `workingvolume/logs/`, surfaced through the output upload.
    pub logs_dir: PathBuf,
}

impl Workspace {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        let volume_dir = working_dir.join(VOLUME_DIR);
        Self::with_volume_dir(working_dir, volume_dir)
    }

    /// Layout whose working volume is backed by an explicit host directory
    /// instead of `workingvolume/` under the working directory.
    pub fn with_volume_dir(working_dir: impl Into<PathBuf>, volume_dir: PathBuf) -> Self {
        let logs_dir = volume_dir.join(LOGS_DIR);
        Self {
            working_dir: working_dir.into(),
            volume_dir,
            logs_dir,
        }
    }

    /// Create the directory layout and seed the logs directory with the
    /// debugging artifacts: a copy of the compose document, the transfer
    /// trigger, and the scheduler's submit file when present.
    pub fn init(&self, compose_path: &Path) -> CoreResult<()> {
        fs::create_dir_all(&self.logs_dir)?;

        if compose_path.exists() {
            fs::copy(
                compose_path,
                self.logs_dir.join("docker-compose.yml"),
            )?;
        }

        // Keeps HTCondor from transferring the whole working directory back
        // to the submission host.
        fs::write(
            self.logs_dir.join("de-transfer-trigger.log"),
            "This is only used to force HTCondor to transfer files.",
        )?;

        let submit_file = self.working_dir.join("iplant.cmd");
        if submit_file.exists() {
            fs::rename(&submit_file, self.logs_dir.join("iplant.cmd"))?;
        }

        debug!(logs_dir = %self.logs_dir.display(), "workspace initialized");
        Ok(())
    }

    pub fn input_stdout_path(&self, index: usize) -> PathBuf {
        self.logs_dir.join(format!("logs-stdout-input-{index}"))
    }

    pub fn input_stderr_path(&self, index: usize) -> PathBuf {
        self.logs_dir.join(format!("logs-stderr-input-{index}"))
    }

    pub fn step_stdout_path(&self, index: usize) -> PathBuf {
        self.logs_dir.join(format!("step-{index}.out"))
    }

    pub fn step_stderr_path(&self, index: usize) -> PathBuf {
        self.logs_dir.join(format!("step-{index}.err"))
    }

    pub fn output_stdout_path(&self) -> PathBuf {
        self.logs_dir.join("logs-stdout-output")
    }

    pub fn output_stderr_path(&self) -> PathBuf {
        self.logs_dir.join("logs-stderr-output")
    }
}

/// Copy the job description to `<to_dir>/<invocation>.json` so the image
/// janitor knows which images belong to live jobs.
pub fn copy_job_file(invocation: &str, from: &Path, to_dir: &Path) -> CoreResult<PathBuf> {
    let target = to_dir.join(format!("{invocation}.json"));
    fs::copy(from, &target)?;
    Ok(target)
}

/// Remove the copy made by [`copy_job_file`].
pub fn delete_job_file(invocation: &str, to_dir: &Path) -> CoreResult<()> {
    fs::remove_file(to_dir.join(format!("{invocation}.json")))?;
    Ok(())
}

/// Write `JobSummary.csv` into the logs directory.
pub fn write_job_summary(logs_dir: &Path, job: &Job) -> CoreResult<()> {
    let mut writer = csv::Writer::from_path(logs_dir.join("JobSummary.csv"))?;
    let invocation = job.invocation();
    writer.write_record(["Job ID", invocation.as_str()])?;
    writer.write_record(["Job Name", job.name.as_str()])?;
    writer.write_record(["Application ID", job.app_id.as_str()])?;
    writer.write_record(["Application Name", job.app_name.as_str()])?;
    writer.write_record(["Submitted By", job.submitter.as_str()])?;
    writer.flush()?;
    Ok(())
}

/// Write `JobParameters.csv` into the logs directory: one row per parameter
/// across all steps.
pub fn write_job_parameters(logs_dir: &Path, job: &Job) -> CoreResult<()> {
    let mut writer = csv::Writer::from_path(logs_dir.join("JobParameters.csv"))?;
    writer.write_record(["Executable", "Argument Option", "Argument Value"])?;
    for step in &job.steps {
        let mut params: Vec<_> = step.config.params.iter().collect();
        params.sort_by_key(|p| p.order);
        for param in params {
            writer.write_record([&step.executable, &param.name, &param.value])?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_model::{Step, StepConfig, StepParam};
    use uuid::Uuid;

    fn job() -> Job {
        Job {
            invocation_id: Uuid::parse_str("07b04ce2-7757-4b21-9e15-0b4c2f44be26").unwrap(),
            name: "test-job".into(),
            app_id: "app-id".into(),
            app_name: "test-app".into(),
            submitter: "tester".into(),
            steps: vec![Step {
                executable: "/usr/bin/echo".into(),
                config: StepConfig {
                    params: vec![
                        StepParam {
                            name: "--greeting".into(),
                            value: "hello".into(),
                            order: 1,
                            ..Default::default()
                        },
                        StepParam {
                            name: "-n".into(),
                            value: "1".into(),
                            order: 0,
                            ..Default::default()
                        },
                    ],
                },
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn init_creates_layout_and_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let compose = dir.path().join("docker-compose.yml");
        fs::write(&compose, "version: '2'\n").unwrap();
        fs::write(dir.path().join("iplant.cmd"), "universe = vanilla\n").unwrap();

        let workspace = Workspace::new(dir.path());
        workspace.init(&compose).unwrap();

        assert!(workspace.logs_dir.is_dir());
        assert!(workspace.logs_dir.join("docker-compose.yml").exists());
        assert!(workspace.logs_dir.join("de-transfer-trigger.log").exists());
        assert!(workspace.logs_dir.join("iplant.cmd").exists());
        assert!(!dir.path().join("iplant.cmd").exists());
    }

    #[test]
    fn job_summary_matches_the_documented_format() {
        let dir = tempfile::tempdir().unwrap();
        write_job_summary(dir.path(), &job()).unwrap();

        let content = fs::read_to_string(dir.path().join("JobSummary.csv")).unwrap();
        let expected = "Job ID,07b04ce2-7757-4b21-9e15-0b4c2f44be26\n\
                        Job Name,test-job\n\
                        Application ID,app-id\n\
                        Application Name,test-app\n\
                        Submitted By,tester\n";
        assert_eq!(content, expected);
    }

    #[test]
    fn job_parameters_lists_params_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_job_parameters(dir.path(), &job()).unwrap();

        let content = fs::read_to_string(dir.path().join("JobParameters.csv")).unwrap();
        let expected = "Executable,Argument Option,Argument Value\n\
                        /usr/bin/echo,-n,1\n\
                        /usr/bin/echo,--greeting,hello\n";
        assert_eq!(content, expected);
    }

    #[test]
    fn job_file_copy_and_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("job.json");
        fs::write(&from, "{}").unwrap();

        let target = copy_job_file("inv-1", &from, dir.path()).unwrap();
        assert_eq!(target, dir.path().join("inv-1.json"));
        assert!(target.exists());

        delete_job_file("inv-1", dir.path()).unwrap();
        assert!(!target.exists());
    }

    #[test]
    fn log_paths_follow_naming_scheme() {
        let workspace = Workspace::new("/work");
        assert_eq!(
            workspace.input_stderr_path(2),
            PathBuf::from("/work/workingvolume/logs/logs-stderr-input-2")
        );
        assert_eq!(
            workspace.step_stdout_path(0),
            PathBuf::from("/work/workingvolume/logs/step-0.out")
        );
        assert_eq!(
            workspace.output_stderr_path(),
            PathBuf::from("/work/workingvolume/logs/logs-stderr-output")
        );
    }
}

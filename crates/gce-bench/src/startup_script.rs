//! Benchmark startup script attached to every instance.

/// Metadata key Compute Engine runs on boot.
pub const STARTUP_SCRIPT_KEY: &str = "startup-script";

/// Log file the startup script writes all of its output to.
pub const BENCHMARK_LOG_PATH: &str = "/var/log/startupscript.log";

/// Line printed once the last benchmark has finished.
pub const COMPLETION_MARKER: &str = "Fio disk test completed!";

/// Installs sysbench, stress-ng and fio, runs each with fixed parameters and
/// redirects everything to [`BENCHMARK_LOG_PATH`].
///
/// The script is not templated: every instance gets these exact bytes.
pub const STARTUP_SCRIPT: &str = r#"#!/bin/bash
set -x
exec > /var/log/startupscript.log 2>&1
# Update and install necessary packages
sudo apt-get update
sudo apt-get install -y sysbench stress-ng fio
# Run Sysbench CPU test
echo "Running Sysbench CPU test..."
sysbench cpu --cpu-max-prime=20000 run
echo "Sysbench CPU test completed!"
# Run Stress-ng
echo "Running Stress-ng..."
stress-ng --cpu 4 --timeout 60 --metrics-brief
echo "Stress-ng test completed!"
# Run the fio benchmarking tool
echo "Running Fio disk test..."
fio --name=random-write --ioengine=posixaio --rw=randwrite --bs=4k --size=4g --numjobs=1 --runtime=60 --time_based --end_fsync=1
echo "Fio disk test completed!"
"#;

/// Whether a fetched log shows the script ran to the end.
#[must_use]
pub fn is_complete(log: &str) -> bool {
    log.lines().any(|line| line.trim() == COMPLETION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_writes_to_log_path() {
        assert!(STARTUP_SCRIPT.starts_with("#!/bin/bash\n"));
        assert!(STARTUP_SCRIPT.contains(&format!("exec > {BENCHMARK_LOG_PATH} 2>&1")));
    }

    #[test]
    fn test_script_runs_all_three_tools() {
        for tool in ["sysbench cpu", "stress-ng --cpu", "fio --name=random-write"] {
            assert!(STARTUP_SCRIPT.contains(tool), "missing {tool}");
        }
    }

    #[test]
    fn test_is_complete() {
        // The `set -x` trace echoes the command with a `+ echo` prefix, so
        // only the bare output line counts.
        assert!(!is_complete("+ echo 'Fio disk test completed!'\n"));
        assert!(!is_complete("Running Fio disk test...\n"));
        assert!(is_complete("Running Fio disk test...\nFio disk test completed!\n"));
    }
}

use super::*;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;

mod fixtures {
    use super::*;

    // Runs _report() with the specified options and fake stdout/stderr. Returns values for tests
    // to examine afterward.
    pub fn test_report(
        invocation: &Invocation,
        output: Output,
    ) -> (io::Result<()>, String, String) {
        let mut stdout = vec![];
        let mut stderr = vec![];
        let result = _report(&mut stdout, &mut stderr, "alice", invocation, &output);
        (
            result,
            String::from_utf8(stdout).unwrap(),
            String::from_utf8(stderr).unwrap(),
        )
    }

    // Returns an Output value with the given exit code and captured output.
    pub fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            // Raw wait statuses keep the exit code in the second byte.
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }
}

use fixtures::*;

mod starting {
    use super::*;

    #[test]
    fn lines_up_with_completed() {
        let mut stdout = vec![];
        _starting(&mut stdout, "alice", &Invocation::sudo("swapoff -a")).unwrap();
        assert_eq!(
            "[alice] Starting  sudo: swapoff -a\n",
            String::from_utf8_lossy(&stdout),
        );
    }
}

mod _report {
    use super::*;

    #[test]
    fn success_without_output() {
        let (result, stdout, stderr) = test_report(&Invocation::run("true"), output(0, "", ""));
        result.unwrap();
        assert_eq!("[alice] Completed run: true\n", stdout);
        assert_eq!("", stderr);
    }

    #[test]
    fn success_with_output() {
        let (result, stdout, stderr) = test_report(
            &Invocation::sudo("dphys-swapfile setup"),
            output(0, "want /var/swap=100MByte\ngenerating swapfile ... done\n", "warning\n"),
        );
        result.unwrap();
        assert_eq!(
            "[alice] Completed sudo: dphys-swapfile setup\n    \
            Captured stdout:\n        \
            want /var/swap=100MByte\n        \
            generating swapfile ... done\n",
            stdout,
        );
        assert_eq!(
            "    Captured stderr:\n        \
            warning\n",
            stderr,
        );
    }

    #[test]
    fn quiet_hides_stdout_only() {
        let (result, stdout, stderr) = test_report(
            &Invocation::sudo("dpkg --get-selections").quiet(),
            output(0, "dropbear\tinstall\n", "noise\n"),
        );
        result.unwrap();
        assert_eq!("[alice] Completed sudo: dpkg --get-selections\n", stdout);
        assert_eq!("    Captured stderr:\n        noise\n", stderr);
    }

    #[test]
    fn failure() {
        let (result, stdout, stderr) = test_report(
            &Invocation::sudo("apt-get install -qy nope"),
            output(100, "", "E: Unable to locate package nope\n"),
        );
        result.unwrap();
        assert_eq!("", stdout);
        assert_eq!(
            "[alice] Command failed. See below for details.\n    \
            Captured stderr:\n        \
            E: Unable to locate package nope\n\
            Command exited with exit code 100: sudo: apt-get install -qy nope\n",
            stderr,
        );
    }

    #[test]
    fn killed_by_signal() {
        let output = Output {
            // SIGKILL
            status: ExitStatus::from_raw(9),
            stdout: vec![],
            stderr: vec![],
        };
        let (result, _, stderr) = test_report(&Invocation::run("sleep 100"), output);
        result.unwrap();
        assert!(
            stderr.ends_with("Command exited with error: run: sleep 100\n"),
            "{stderr}",
        );
    }
}

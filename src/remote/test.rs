use super::*;
use std::cell::RefCell;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus};

// A Remote that exercises the provided trait methods: it records each invocation and exits with
// a fixed code.
struct Scripted {
    code: i32,
    seen: RefCell<Vec<Invocation>>,
}

impl Scripted {
    fn new(code: i32) -> Self {
        Scripted {
            code,
            seen: RefCell::new(vec![]),
        }
    }
}

impl Remote for Scripted {
    fn host(&self) -> &str {
        "pi"
    }

    fn execute(&self, invocation: &Invocation) -> anyhow::Result<Output> {
        self.seen.borrow_mut().push(invocation.clone());
        Ok(Output {
            status: ExitStatus::from_raw(self.code << 8),
            stdout: b"out\n".to_vec(),
            stderr: b"err\n".to_vec(),
        })
    }

    fn reboot(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// A Remote that really runs scripts with `sh -c`, as the login user even when asked for sudo.
struct Shell;

impl Remote for Shell {
    fn host(&self) -> &str {
        "localhost"
    }

    fn execute(&self, invocation: &Invocation) -> anyhow::Result<Output> {
        Ok(Command::new("sh").arg("-c").arg(&invocation.script).output()?)
    }

    fn reboot(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

mod invocation {
    use super::*;

    #[test]
    fn constructors() {
        let run = Invocation::run("whoami");
        assert!(!run.sudo);
        assert!(!run.quiet);

        let sudo = Invocation::sudo("whoami").quiet();
        assert!(sudo.sudo);
        assert!(sudo.quiet);
    }

    #[test]
    fn title() {
        assert_eq!("run: uptime", Invocation::run("uptime").title());
        assert_eq!("sudo: reboot", Invocation::sudo("reboot").title());
    }
}

mod quote {
    use super::*;

    #[test]
    fn leaves_plain_words_alone() {
        assert_eq!("/etc/network/interfaces", quote("/etc/network/interfaces").unwrap());
    }

    #[test]
    fn quotes_shell_syntax() {
        assert_eq!("'a; rm -rf /'", quote("a; rm -rf /").unwrap());
    }

    #[test]
    fn rejects_nul() {
        match quote("a\0b").unwrap_err() {
            RemoteError::Unquotable(value) => assert_eq!("a\0b", value),
            e => panic!("unexpected error: {e:?}"),
        }
    }
}

mod provided_methods {
    use super::*;

    #[test]
    fn checked_returns_stdout() {
        let remote = Scripted::new(0);
        assert_eq!("out\n", remote.sudo("true").unwrap());
        assert_eq!(vec![Invocation::sudo("true")], *remote.seen.borrow());
    }

    #[test]
    fn checked_fails_on_nonzero_exit() {
        let remote = Scripted::new(100);
        let error = remote.run("apt-get update").unwrap_err();
        assert_eq!(
            "[pi] command exited with exit code 100: apt-get update",
            error.to_string(),
        );
        match error.downcast_ref::<RemoteError>().unwrap() {
            RemoteError::CommandFailed { stderr, status, .. } => {
                assert_eq!("err\n", stderr);
                assert_eq!("exit code 100", status);
            }
            e => panic!("unexpected error: {e:?}"),
        }
    }

    #[test]
    fn sudo_quiet() {
        let remote = Scripted::new(0);
        remote.sudo_quiet("dpkg --get-selections").unwrap();
        assert_eq!(
            vec![Invocation::sudo("dpkg --get-selections").quiet()],
            *remote.seen.borrow(),
        );
    }

    #[test]
    fn read_file_quotes_path() {
        let remote = Scripted::new(0);
        remote.read_file("/boot/my config.txt").unwrap();
        assert_eq!(
            vec![Invocation::sudo(
                "test ! -e '/boot/my config.txt' || cat '/boot/my config.txt'"
            )
            .quiet()],
            *remote.seen.borrow(),
        );
    }

    #[test]
    fn write_file_with_mode() {
        let remote = Scripted::new(0);
        remote
            .write_file("/etc/network/interfaces", "auto lo\n", Some(0o644))
            .unwrap();

        let seen = remote.seen.borrow();
        assert_eq!(1, seen.len());
        assert!(seen[0].sudo);
        assert!(seen[0].quiet);
        let script = &seen[0].script;
        assert!(script.starts_with("printf '%s' "), "{script}");
        assert!(script.contains("auto lo"), "{script}");
        assert!(
            script.ends_with(
                " > /etc/network/interfaces && chmod 644 /etc/network/interfaces"
            ),
            "{script}",
        );
    }

    #[test]
    fn write_file_without_mode() {
        let remote = Scripted::new(0);
        remote.write_file("/etc/dphys-swapfile", "x", None).unwrap();
        assert_eq!(
            "printf '%s' x > /etc/dphys-swapfile",
            remote.seen.borrow()[0].script,
        );
    }
}

mod files {
    use super::*;
    use crate::edit::{edit_file, LineEdit};

    fn path(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[test]
    fn missing_file_reads_as_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!("", Shell.read_file(&path(&dir, "missing"))?);
        Ok(())
    }

    #[test]
    fn existing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = path(&dir, "hosts");
        std::fs::write(&file, "127.0.0.1 localhost\n")?;
        assert_eq!("127.0.0.1 localhost\n", Shell.read_file(&file)?);
        Ok(())
    }

    #[test]
    fn rejects_invalid_utf8() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = path(&dir, "latin1");
        std::fs::write(&file, b"caf\xe9\n")?;
        let error = Shell.read_file(&file).unwrap_err();
        assert!(error.to_string().contains("is not valid UTF-8"), "{error}");
        Ok(())
    }

    #[test]
    fn unreadable_path_still_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // A directory exists but cannot be read with cat.
        assert!(Shell.read_file(&path(&dir, "")).is_err());
        Ok(())
    }

    #[test]
    fn edit_creates_missing_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = path(&dir, "blacklist");
        let edits = [LineEdit::ensure_literal("blacklist ipv6")];

        assert!(edit_file(&Shell, &file, &edits)?);
        assert_eq!("blacklist ipv6\n", std::fs::read_to_string(&file)?);
        assert!(!edit_file(&Shell, &file, &edits)?);
        Ok(())
    }
}

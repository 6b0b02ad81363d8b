//! Workflow emulation tests: the secrets mount must never outlive a run.

mod helpers;

use helpers::{assert_absent, assert_symlink, exit, Answer, RecordingRunner, TestEnv};
use shipwright::commands::cmd_emulate;
use shipwright::config::{Config, Layer};
use shipwright::error::{exit_code, Error, Signal};
use shipwright::process::SystemRunner;
use std::cell::Cell;
use std::fs;
use std::rc::Rc;

fn typed(err: &anyhow::Error) -> &Error {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .expect("expected a typed shipwright error")
}

/// Runner that checks the mount is live while the emulator runs, then
/// exits with `code`.
fn emulator_exiting(env: &TestEnv, code: i32) -> (RecordingRunner, Rc<Cell<bool>>) {
    let mount = env.host.mount_point.clone();
    let saw_mount = Rc::new(Cell::new(false));
    let seen = Rc::clone(&saw_mount);
    let runner = RecordingRunner::with(move |cmd| {
        if cmd.program() == "act" {
            seen.set(mount.is_symlink());
        }
        Ok(exit(code))
    });
    (runner, saw_mount)
}

#[test]
fn test_emulator_failure_still_removes_mount() {
    let env = TestEnv::new();
    env.seed_secrets();
    let (runner, saw_mount) = emulator_exiting(&env, 7);

    let err = env
        .dispatcher(&runner, &Answer(false))
        .dispatch("emulate-workflow", &Layer::new())
        .unwrap_err();

    assert!(saw_mount.get(), "mount should exist while act runs");
    assert_absent(&env.host.mount_point);
    assert!(matches!(
        typed(&err),
        Error::SubprocessFailure { program, code: 7 } if program == "act"
    ));
    assert_eq!(exit_code(&err), 7);
}

#[test]
fn test_successful_run_links_then_unlinks() {
    let env = TestEnv::new();
    let secrets = env.seed_secrets();
    let mount = env.host.mount_point.clone();
    let runner = RecordingRunner::with(move |cmd| {
        if cmd.program() == "act" {
            assert_symlink(&mount, &secrets);
        }
        Ok(exit(0))
    });

    env.dispatcher(&runner, &Answer(false))
        .dispatch("emulate-workflow", &Layer::new())
        .unwrap();

    assert_eq!(runner.programs(), ["act"]);
    assert_absent(&env.host.mount_point);
}

#[test]
fn test_interruption_still_removes_mount() {
    let env = TestEnv::new();
    env.seed_secrets();
    let runner = RecordingRunner::with(|_| {
        Err(Error::Interrupted {
            signal: Signal::Terminate,
        }
        .into())
    });

    let err = env
        .dispatcher(&runner, &Answer(false))
        .dispatch("emulate-workflow", &Layer::new())
        .unwrap_err();

    assert!(matches!(typed(&err), Error::Interrupted { .. }));
    assert_eq!(exit_code(&err), 143);
    assert_absent(&env.host.mount_point);
}

#[test]
fn test_panicking_emulator_still_removes_mount() {
    let env = TestEnv::new();
    env.seed_secrets();
    let runner = RecordingRunner::with(|_| panic!("emulator blew up"));
    let config = Config::resolve(&Layer::new(), &Layer::new(), &Layer::new());

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cmd_emulate(&env.workspace, &config, &runner, &env.host)
    }));

    assert!(outcome.is_err());
    assert_absent(&env.host.mount_point);
}

#[test]
fn test_stale_mount_and_artifacts_are_replaced() {
    let env = TestEnv::new();
    let secrets = env.seed_secrets();
    std::os::unix::fs::symlink(env.root().join("old"), &env.host.mount_point).unwrap();
    fs::create_dir_all(env.host.scratch_dir.join("1")).unwrap();
    fs::write(env.host.scratch_dir.join("1/old.tar"), "stale").unwrap();

    let mount = env.host.mount_point.clone();
    let scratch = env.host.scratch_dir.clone();
    let runner = RecordingRunner::with(move |_| {
        assert_symlink(&mount, &secrets);
        assert_eq!(fs::read_dir(&scratch)?.count(), 0);
        Ok(exit(0))
    });

    env.dispatcher(&runner, &Answer(false))
        .dispatch("emulate-workflow", &Layer::new())
        .unwrap();
    assert!(env.host.scratch_dir.is_dir());
}

#[test]
fn test_missing_secrets_is_only_a_warning() {
    let env = TestEnv::new();
    let (runner, saw_mount) = emulator_exiting(&env, 0);

    env.dispatcher(&runner, &Answer(false))
        .dispatch("emulate-workflow", &Layer::new())
        .unwrap();

    assert!(saw_mount.get());
    assert_absent(&env.host.mount_point);
}

#[test]
fn test_scratch_failure_aborts_before_mount() {
    let mut env = TestEnv::new();
    // A regular file where the scratch directory should be.
    let blocker = env.root().join("not-a-dir");
    fs::write(&blocker, "x").unwrap();
    env.host.scratch_dir = blocker.join("artifacts");
    let runner = RecordingRunner::succeeding();

    let err = env
        .dispatcher(&runner, &Answer(false))
        .dispatch("emulate-workflow", &Layer::new())
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to create"));
    assert!(runner.calls().is_empty());
    assert_absent(&env.host.mount_point);
}

#[test]
fn test_mount_failure_aborts_before_emulator() {
    let mut env = TestEnv::new();
    env.host.mount_point = env.root().join("missing-parent/secrets");
    let runner = RecordingRunner::succeeding();

    let err = env
        .dispatcher(&runner, &Answer(false))
        .dispatch("emulate-workflow", &Layer::new())
        .unwrap_err();

    assert!(format!("{:#}", err).contains("Failed to link"));
    assert!(runner.calls().is_empty());
}

#[test]
fn test_invalid_pull_setting_touches_nothing() {
    let env = TestEnv::new();
    let runner = RecordingRunner::succeeding();
    let overrides: Layer = [("ACT_PULL".to_string(), "maybe".to_string())]
        .into_iter()
        .collect();

    let err = env
        .dispatcher(&runner, &Answer(false))
        .dispatch("emulate-workflow", &overrides)
        .unwrap_err();

    assert!(matches!(typed(&err), Error::InvalidSetting { key: "ACT_PULL", .. }));
    assert!(!env.host.scratch_dir.exists());
    assert_absent(&env.host.mount_point);
    assert!(runner.calls().is_empty());
}

#[test]
fn test_real_emulator_process_sees_mount() {
    let mut env = TestEnv::new();
    env.seed_secrets();

    // Stand-in emulator: exit 9 if the mount is missing, 5 otherwise.
    let script = env.script(
        "fake-act",
        &format!("test -L '{}' || exit 9\nexit 5\n", env.host.mount_point.display()),
    );
    env.host.emulator = script.to_string_lossy().into_owned();

    let err = env
        .dispatcher(&SystemRunner, &Answer(false))
        .dispatch("emulate-workflow", &Layer::new())
        .unwrap_err();

    assert_eq!(exit_code(&err), 5);
    assert_absent(&env.host.mount_point);
}

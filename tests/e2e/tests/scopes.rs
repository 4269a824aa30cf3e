//! Scope outcomes and isolation between concurrent harnesses

mod common;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::Result;
use common::*;
use nontest::{Outcome, TestControl};
use test_case::test_case;

#[test_case("fatal" => Outcome::Failed ; "fatal fails")]
#[test_case("fail_now" => Outcome::Failed ; "fail now fails")]
#[test_case("skip" => Outcome::Skipped ; "skip skips")]
#[test_case("skip_now" => Outcome::Skipped ; "skip now skips")]
#[test_case("error" => Outcome::Failed ; "error fails")]
#[test_case("log" => Outcome::Passed ; "log passes")]
fn test_signal_outcome(signal: &str) -> Outcome {
    let (harness, _) = memory_harness(true);
    harness.run(|t| match signal {
        "fatal" => t.fatal("fatal"),
        "fail_now" => t.fail_now(),
        "skip" => t.skip("skip"),
        "skip_now" => t.skip_now(),
        "error" => t.error("error"),
        _ => t.log("log"),
    })
}

#[test_case(true, false ; "abort stops the scope")]
#[test_case(false, true ; "without abort the scope continues")]
fn test_code_after_fatal(allow_exit: bool, expect_reached: bool) {
    let (harness, _) = memory_harness(allow_exit);
    let reached = AtomicBool::new(false);

    let outcome = harness.run(|t| {
        t.fatal("stop here");
        reached.store(true, Ordering::SeqCst);
    });

    assert_eq!(outcome, Outcome::Failed);
    assert_eq!(reached.load(Ordering::SeqCst), expect_reached);
}

#[test]
fn test_concurrent_harnesses_are_isolated() -> Result<()> {
    const HARNESSES: usize = 6;

    let handles: Vec<_> = (0..HARNESSES)
        .map(|i| {
            thread::spawn(move || {
                let (harness, logger) = memory_harness(true);
                let key = unique_env_key("ISOLATED");
                let mut dir = PathBuf::new();

                let outcome = harness.run(|t| {
                    t.set_env(&key, &i.to_string());
                    dir = t.temp_dir();
                    t.log_fmt(format_args!("harness {}", i));
                    if i % 2 == 1 {
                        t.skip("odd harness");
                    }
                });

                let restored = std::env::var_os(&key).is_none();
                (outcome, dir, restored, logger.entries().len())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (outcome, dir, restored, entries) = handle.join().expect("harness thread panicked");
        let expected = if i % 2 == 1 {
            Outcome::Skipped
        } else {
            Outcome::Passed
        };
        assert_eq!(outcome, expected, "harness {}", i);
        assert!(!dir.as_os_str().is_empty());
        assert!(!dir.exists(), "temp dir of harness {} survived", i);
        assert!(restored, "env of harness {} not restored", i);
        assert_eq!(entries, 1 + i % 2);
    }
    Ok(())
}

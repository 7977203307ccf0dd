//! Boundary cases around the closing protocol.
//!
//! These are targeted repro-style tests: forking racing the close, the
//! shutter itself being interrupted, and a child that stalls the join
//! fence.

mod common;

use common::init_test_logging;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use taskscope::{scoped, Cx, Error, ErrorKind, Interrupt};

/// Forking concurrently with the body returning must either admit a child
/// that is then interrupted and joined, or fail with `ScopeClosed`; no
/// child may leak past the scope.
#[test]
fn fork_racing_close_never_leaks() {
    init_test_logging();
    let cx = Cx::for_thread();
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let result = scoped(&cx, |scope| {
        let sibling_scope = scope.clone();
        let started_outer = Arc::clone(&started);
        let finished_outer = Arc::clone(&finished);
        scope.fork_detached(&cx, move |child_cx| {
            // Keep admitting siblings until the scope closes under us.
            loop {
                let started = Arc::clone(&started_outer);
                let finished = Arc::clone(&finished_outer);
                let admitted = sibling_scope.fork_detached(child_cx, move |sibling_cx| {
                    started.fetch_add(1, Ordering::SeqCst);
                    let _ = sibling_cx.sleep(Duration::from_micros(100));
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
                match admitted {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::ScopeClosed => return Ok(()),
                    Err(e) => return Err(e),
                }
                // Bail out promptly once the shutdown interrupt lands.
                child_cx.checkpoint()?;
            }
        })?;
        cx.sleep(Duration::from_millis(20))?;
        Ok(())
    });

    // The forker either returned cleanly on ScopeClosed or raised the
    // closure interrupt, which the closed scope swallows.
    result.expect("no unexpected failure");

    // Every admitted sibling ran to completion before scoped returned.
    assert_eq!(
        started.load(Ordering::SeqCst),
        finished.load(Ordering::SeqCst),
        "a sibling outlived the scope"
    );
}

/// An interrupt delivered to the parent while it is shutting children down
/// is retained and raised once the children are joined, provided the body
/// produced a value.
#[test]
fn parent_interrupt_during_shutdown_is_retained() {
    init_test_logging();
    let cx = Cx::for_thread();
    let parent = cx.task();

    let result: Result<(), Error> = scoped(&cx, |scope| {
        scope.fork_detached(&cx, |child_cx| {
            // Absorb the closure interrupt, linger, then exit cleanly, so
            // the shutter stays at the fence while the foreign interrupt
            // arrives.
            let _ = child_cx.park();
            std::thread::sleep(Duration::from_millis(300));
            Ok(())
        })?;
        let parent = parent.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            parent.interrupt(Interrupt::foreign("operator stop"));
        });
        Ok(())
    });

    let error = result.expect_err("shutter interrupt surfaces");
    assert_eq!(error.kind(), ErrorKind::Interrupted);
    assert!(!error.is_scope_closure());

    // Retained and surfaced by scoped, not left for a later checkpoint.
    assert!(cx.checkpoint().is_ok());
}

/// The body's own failure wins over an interrupt received while closing.
#[test]
fn body_failure_discards_the_shutdown_interrupt() {
    init_test_logging();
    let cx = Cx::for_thread();
    let parent = cx.task();

    let result: Result<(), Error> = scoped(&cx, |scope| {
        scope.fork_detached(&cx, |child_cx| {
            let _ = child_cx.park();
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })?;
        let parent = parent.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            parent.interrupt(Interrupt::foreign("discarded"));
        });
        Err(Error::user("body failure"))
    });

    let error = result.expect_err("body failure surfaces");
    assert_eq!(error.kind(), ErrorKind::User);
    assert_eq!(error.context(), Some("body failure"));
}

/// A child that swallows the closure interrupt stalls the join fence; a
/// timed wait reports the children as still live, and the scope only
/// closes once the child gives up.
#[test]
fn uncooperative_child_stalls_the_fence() {
    init_test_logging();
    let cx = Cx::for_thread();
    let started = Instant::now();

    scoped(&cx, |scope| {
        scope.fork_detached(&cx, |child_cx| {
            // Ignore cancellation for a while.
            child_cx.masked(|| std::thread::sleep(Duration::from_millis(300)));
            Ok(())
        })?;

        let quiesced = scope.wait_for(&cx, Duration::from_millis(30))?;
        assert!(!quiesced, "timed wait should report a live child");
        Ok(())
    })
    .expect("scope closes once the child cooperates");

    assert!(
        started.elapsed() >= Duration::from_millis(250),
        "the fence should have blocked on the uncooperative child"
    );
}

/// A foreign interrupt that looks like a closure interrupt but arrives
/// while the scope is still open is a real failure and propagates.
#[test]
fn foreign_interrupt_on_open_scope_propagates() {
    init_test_logging();
    let cx = Cx::for_thread();

    let result: Result<(), Error> = scoped(&cx, |scope| {
        let handle = scope.fork(&cx, |child_cx| -> Result<(), Error> {
            let error = child_cx.park();
            Err(error)
        })?;
        // Interrupt the child from outside while the scope is open.
        handle.task().interrupt(Interrupt::foreign("third party"));
        scope.wait(&cx)?;
        Ok(())
    });

    let error = result.expect_err("foreign interrupt propagates");
    assert_eq!(error.kind(), ErrorKind::Interrupted);
    assert!(!error.is_scope_closure());
}

/// Capturing children propagate foreign interrupts to the parent even
/// though they capture everything else.
#[test]
fn captured_child_still_reports_foreign_interrupts() {
    init_test_logging();
    let cx = Cx::for_thread();

    let mut outcome_kind = None;
    let result: Result<(), Error> = scoped(&cx, |scope| {
        let handle = scope.fork_try(&cx, |child_cx| {
            let error = child_cx.park();
            Err::<(), _>(error)
        })?;
        handle.task().interrupt(Interrupt::foreign("third party"));
        // Masked join: read the captured outcome before observing the
        // interrupt the child propagated alongside it.
        let outcome = cx.masked(|| handle.join(&cx))?;
        outcome_kind = outcome.raised().map(Error::kind);
        scope.wait(&cx)?;
        Ok(())
    });

    // Captured on the handle...
    assert_eq!(outcome_kind, Some(ErrorKind::Interrupted));
    // ...and additionally propagated, because it was asynchronous and
    // foreign to the scope.
    let error = result.expect_err("async failure propagates");
    assert_eq!(error.kind(), ErrorKind::Interrupted);
}

/// Spawning the sibling of a failed child after the failure already
/// propagated: the admission itself must stay consistent. (Repro for the
/// bookkeeping, not a semantic guarantee beyond "no leak, no hang".)
#[test]
fn failure_during_active_forking_closes_cleanly() {
    init_test_logging();
    let cx = Cx::for_thread();
    let result: Result<(), Error> = scoped(&cx, |scope| {
        for i in 0..8 {
            scope.fork_detached(&cx, move |_cx| {
                if i == 3 {
                    Err(Error::user("third child fails"))
                } else {
                    Ok(())
                }
            })?;
        }
        scope.wait(&cx)?;
        Ok(())
    });
    let error = result.expect_err("failure surfaces");
    assert_eq!(error.kind(), ErrorKind::User);
    assert_eq!(error.context(), Some("third child fails"));
}

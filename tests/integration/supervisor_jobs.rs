// Supervisor driving a real process. `sh` stands in for the encoder.

#![cfg(unix)]

use hbctl::engine::{
    EncoderLauncher, JobSupervisor, OutputStream, SupervisorError, SupervisorMessage,
    SupervisorState,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn shell_supervisor() -> JobSupervisor {
    JobSupervisor::new(EncoderLauncher::new("sh"), |_| {})
}

#[test]
fn test_exit_status_is_reported() {
    let supervisor = shell_supervisor();
    let outcome = supervisor
        .submit(r#"-c "exit 0""#, Some("ok".to_string()))
        .unwrap()
        .wait_for_exit()
        .unwrap();
    assert!(outcome.success);

    let outcome = supervisor
        .submit(r#"-c "exit 4""#, None)
        .unwrap()
        .wait_for_exit()
        .unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.exit_code, Some(4));
    assert_eq!(supervisor.state(), SupervisorState::Idle);
}

#[test]
fn test_output_lines_are_forwarded() {
    let supervisor = shell_supervisor();
    let rx = supervisor.messages();
    supervisor
        .submit(r#"-c "echo frame 1; echo oops >&2; echo frame 2""#, None)
        .unwrap()
        .wait_for_exit()
        .unwrap();

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for message in rx.try_iter() {
        if let SupervisorMessage::Output { stream, line, .. } = message {
            match stream {
                OutputStream::Stdout => stdout.push(line),
                OutputStream::Stderr => stderr.push(line),
            }
        }
    }
    assert_eq!(stdout, vec!["frame 1", "frame 2"]);
    assert_eq!(stderr, vec!["oops"]);
}

#[test]
fn test_second_submit_is_rejected_while_running() {
    let supervisor = shell_supervisor();
    let handle = supervisor.submit(r#"-c "sleep 0.3""#, None).unwrap();

    assert!(matches!(
        supervisor.submit(r#"-c "exit 0""#, None),
        Err(SupervisorError::AlreadyRunning { .. })
    ));
    assert_eq!(supervisor.pending_len(), 0);
    handle.wait_for_exit().unwrap();
    assert!(!supervisor.is_encoding());
}

#[test]
fn test_queue_drains_in_order_and_hook_sees_remaining() {
    let remaining = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::new(AtomicUsize::new(0));
    let (seen, counter) = (remaining.clone(), calls.clone());
    let supervisor = JobSupervisor::new(EncoderLauncher::new("sh"), move |outcome| {
        counter.fetch_add(1, Ordering::SeqCst);
        seen.lock().unwrap().push(outcome.pending_after);
    });

    let ids: Vec<_> = (1..=3)
        .map(|i| supervisor.enqueue(&format!(r#"-c "exit {}""#, i - 1), None))
        .collect();

    let mut finished = Vec::new();
    while let Some(handle) = supervisor.advance().unwrap() {
        finished.push(handle.wait_for_exit().unwrap());
    }

    let order: Vec<_> = finished.iter().map(|o| o.job.id).collect();
    assert_eq!(order, ids);
    assert_eq!(finished[0].exit_code, Some(0));
    assert_eq!(finished[2].exit_code, Some(2));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(*remaining.lock().unwrap(), vec![2, 1, 0]);
}

#[test]
fn test_missing_encoder_is_a_launch_error() {
    let supervisor = JobSupervisor::new(EncoderLauncher::new("/nonexistent/HandBrakeCLI"), |_| {});
    supervisor.enqueue("-b 1000", None);

    match supervisor.advance() {
        Err(SupervisorError::Launch { executable, .. }) => {
            assert_eq!(executable, "/nonexistent/HandBrakeCLI")
        }
        other => panic!("expected launch error, got {:?}", other.map(|h| h.is_some())),
    }
    assert_eq!(supervisor.state(), SupervisorState::Idle);
    assert_eq!(supervisor.pending_len(), 1);
}

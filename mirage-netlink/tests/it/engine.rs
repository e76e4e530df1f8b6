use mirage_netlink::{
    wire::{constants::*, NetlinkHeader},
    BoxError, Error, ErrorClass, Misuse, RetryPolicy, Session, SessionOptions,
};
use nix::errno::Errno;

use crate::kernel::{batch, done, from_kernel, record, session, status, ScriptedKernel, PORT_ID};

#[test]
fn fire_and_forget_never_reads() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::default());
    let mut request = session.begin_message(RTM_NEWLINK, 0);
    request.attribute(IFLA_IFNAME, b"veth0\0").unwrap();
    request.send().unwrap();

    let kernel = session.transport();
    assert_eq!(kernel.sent.len(), 1);
    assert_eq!(kernel.recv_calls, 0);

    let header = NetlinkHeader::parse(&kernel.sent[0]).unwrap();
    assert_eq!(header.length as usize, kernel.sent[0].len());
    assert_eq!(header.sequence, 0);
    assert_eq!(header.port_id, PORT_ID);
    assert_eq!(header.flags & NLM_F_REQUEST, NLM_F_REQUEST);
}

#[test]
fn sequence_numbers_increase_per_message() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::default());
    for _ in 0..3 {
        session.begin_message(RTM_GETLINK, 0).send().unwrap();
    }

    let sequences: Vec<u32> = session
        .transport()
        .sent
        .iter()
        .map(|message| NetlinkHeader::parse(message).unwrap().sequence)
        .collect();
    assert_eq!(sequences, vec![0, 1, 2]);
    assert_eq!(session.next_sequence(), 3);
}

#[test]
fn send_with_open_attribute_performs_no_write() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::default());
    let mut request = session.begin_message(RTM_NEWLINK, 0);
    request.push_attribute(IFLA_LINKINFO).unwrap();

    let err = request.send().unwrap_err();
    assert!(matches!(err, Error::Misuse(Misuse::OpenAttribute { depth: 1 })));
    assert_eq!(err.class(), ErrorClass::Misuse);
    assert_eq!(session.transport().send_attempts, 0);
}

#[test]
fn transient_send_errors_are_retried() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut kernel = ScriptedKernel::with_batches([batch(&[status(0, 0)])]);
    kernel.send_results.extend([Err(Errno::EINTR), Err(Errno::EAGAIN)]);

    let mut session = session(kernel);
    session.begin_message(RTM_NEWLINK, NLM_F_ACK).send_and_wait().unwrap();

    let kernel = session.transport();
    assert_eq!(kernel.send_attempts, 3);
    assert_eq!(kernel.sent.len(), 1);
}

#[test]
fn bounded_retry_policy_gives_up() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut kernel = ScriptedKernel::default();
    kernel.send_results.extend([Err(Errno::EINTR), Err(Errno::EINTR), Err(Errno::EINTR)]);

    let options = SessionOptions::default().with_retry_policy(RetryPolicy::default().with_max_retries(1));
    let mut session = Session::with_transport(kernel, PORT_ID, options);

    let err = session.begin_message(RTM_NEWLINK, 0).send().unwrap_err();
    assert!(matches!(err, Error::Io(Errno::EINTR)));
    assert_eq!(err.class(), ErrorClass::Transport);
    assert_eq!(session.transport().send_attempts, 2);
    assert!(session.transport().sent.is_empty());
}

#[test]
fn fatal_send_errors_are_not_retried() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut kernel = ScriptedKernel::default();
    kernel.send_results.push_back(Err(Errno::EPERM));

    let mut session = session(kernel);
    let err = session.begin_message(RTM_NEWLINK, 0).send().unwrap_err();
    assert!(matches!(err, Error::Io(Errno::EPERM)));
    assert_eq!(session.transport().send_attempts, 1);
}

#[test]
fn kernel_error_is_decoded() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([batch(&[status(0, -13)])]));
    let err = session.begin_message(RTM_NEWLINK, NLM_F_ACK).send_and_wait().unwrap_err();

    assert!(matches!(err, Error::Kernel(Errno::EACCES)));
    assert_eq!(err.class(), ErrorClass::Kernel);
    assert_eq!(err.raw_os_error(), Some(13));
}

#[test]
fn stale_responses_in_separate_batches_are_skipped() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([
        batch(&[status(0, -17)]),
        batch(&[status(1, 0)]),
    ]));

    // Nobody waits for the first request's answer.
    session.begin_message(RTM_NEWADDR, NLM_F_ACK).send().unwrap();
    session.begin_message(RTM_NEWADDR, NLM_F_ACK).send_and_wait().unwrap();

    assert_eq!(session.transport().recv_calls, 2);
}

#[test]
fn stale_responses_in_same_batch_are_skipped() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([batch(&[
        record(RTM_NEWLINK, 0, NLM_F_MULTI, b"stale"),
        record(RTM_NEWLINK, 1, NLM_F_MULTI, b"fresh"),
        status(1, 0),
    ])]));

    session.begin_message(RTM_GETLINK, 0).send().unwrap();
    let responses: Vec<_> = session
        .begin_message(RTM_GETLINK, NLM_F_ACK)
        .send_acked()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(responses.len(), 2);
    assert!(responses.iter().all(|response| response.sequence == 1));
    assert_eq!(&responses[0].payload[..], b"fresh");
    assert!(responses[1].is_ack());
}

#[test]
fn iteration_ends_after_matching_batch() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([
        batch(&[record(RTM_NEWLINK, 0, 0, b"one"), record(RTM_NEWLINK, 0, 0, b"two")]),
        batch(&[record(RTM_NEWLINK, 0, 0, b"never read")]),
    ]));

    let mut responses = session.begin_message(RTM_GETLINK, 0).send_acked().unwrap();
    assert_eq!(responses.sequence(), 0);
    assert_eq!(&responses.next().unwrap().unwrap().payload[..], b"one");
    assert_eq!(&responses.next().unwrap().unwrap().payload[..], b"two");
    assert!(responses.next().is_none());
    assert!(responses.next().is_none());

    assert_eq!(session.transport().recv_calls, 1);
}

#[test]
fn malformed_batch_tail_is_discarded() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut truncated = record(RTM_NEWLINK, 0, 0, b"cut short");
    truncated.truncate(NLMSG_HDRLEN + 2);

    let mut session = session(ScriptedKernel::with_batches([batch(&[
        record(RTM_NEWLINK, 0, 0, b"whole"),
        truncated,
    ])]));

    let responses: Vec<_> =
        session.begin_message(RTM_GETLINK, 0).send_acked().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(&responses[0].payload[..], b"whole");
    assert_eq!(session.transport().recv_calls, 1);
}

#[test]
fn response_attributes_follow_family_header() {
    let mut payload = vec![0u8; 16];
    payload.extend(7u16.to_ne_bytes());
    payload.extend(IFLA_IFNAME.to_ne_bytes());
    payload.extend(b"lo\0\0");

    let mut session = session(ScriptedKernel::with_batches([batch(&[
        record(RTM_NEWLINK, 0, 0, &payload),
        status(0, 0),
    ])]));

    let mut names = Vec::new();
    session
        .begin_message(RTM_GETLINK, 0)
        .send_with(|response| {
            if !response.is_ack() {
                let name = response.attributes(16).get(IFLA_IFNAME).ok_or("no name")?;
                names.push(name.as_str().ok_or("name is not utf-8")?.to_owned());
            }
            Ok(())
        })
        .unwrap();

    assert_eq!(names, ["lo"]);
}

#[test]
fn done_ends_batch_scan() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([
        batch(&[done(0), record(RTM_NEWLINK, 0, 0, b"after done")]),
        batch(&[status(0, 0)]),
    ]));

    let mut seen = Vec::new();
    session
        .begin_message(RTM_GETLINK, NLM_F_DUMP)
        .send_with(|response| {
            seen.push(response.message_type);
            Ok(())
        })
        .unwrap();

    // The record behind DONE is never looked at, so the call waits for the next batch.
    assert_eq!(seen, vec![NLMSG_ERROR]);
    assert_eq!(session.transport().recv_calls, 2);
}

#[test]
fn handler_error_stops_processing() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([batch(&[
        record(RTM_NEWLINK, 0, NLM_F_MULTI, b"first"),
        record(RTM_NEWLINK, 0, NLM_F_MULTI, b"second"),
        done(0),
    ])]));

    let mut calls = 0;
    let err = session
        .begin_message(RTM_GETLINK, NLM_F_DUMP)
        .send_with(|_| {
            calls += 1;
            Err(BoxError::from("interface not wanted"))
        })
        .unwrap_err();

    assert_eq!(calls, 1);
    assert_eq!(err.class(), ErrorClass::Handler);
    match err {
        Error::Handler(inner) => assert_eq!(inner.to_string(), "interface not wanted"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn enobufs_on_receive_is_retried() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session =
        session(ScriptedKernel::with_batches([Err(Errno::ENOBUFS), batch(&[status(0, 0)])]));
    session.begin_message(RTM_NEWLINK, NLM_F_ACK).send_and_wait().unwrap();

    assert_eq!(session.transport().recv_calls, 2);
}

#[test]
fn interrupted_receive_is_retried() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session =
        session(ScriptedKernel::with_batches([Err(Errno::EINTR), batch(&[status(0, 0)])]));
    session.begin_message(RTM_NEWLINK, NLM_F_ACK).send_and_wait().unwrap();

    assert_eq!(session.transport().recv_calls, 2);
}

#[test]
fn zero_length_read_means_closed() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([Ok((Vec::new(), from_kernel()))]));
    let err = session.begin_message(RTM_NEWLINK, NLM_F_ACK).send_and_wait().unwrap_err();

    assert!(matches!(err, Error::Closed));
    assert_eq!(err.class(), ErrorClass::Transport);
}

#[test]
fn non_netlink_sender_is_rejected() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([Ok((status(0, 0), None))]));
    let err = session.begin_message(RTM_NEWLINK, NLM_F_ACK).send_and_wait().unwrap_err();

    assert!(matches!(err, Error::WrongAddress));
}

#[test]
fn fatal_receive_error_is_reported() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([Err(Errno::EBADF)]));
    let err = session.begin_message(RTM_NEWLINK, NLM_F_ACK).send_and_wait().unwrap_err();

    assert!(matches!(err, Error::Io(Errno::EBADF)));
    assert_eq!(err.raw_os_error(), Some(Errno::EBADF as i32));
}

#[test]
fn session_is_reusable_after_kernel_error() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut session = session(ScriptedKernel::with_batches([
        batch(&[status(0, -(Errno::EEXIST as i32))]),
        batch(&[status(1, 0)]),
    ]));

    let err = session.begin_message(RTM_NEWROUTE, NLM_F_ACK).send_and_wait().unwrap_err();
    assert!(matches!(err, Error::Kernel(Errno::EEXIST)));

    session.begin_message(RTM_NEWROUTE, NLM_F_ACK).send_and_wait().unwrap();
}

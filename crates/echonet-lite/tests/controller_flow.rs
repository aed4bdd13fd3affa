use echonet_lite::metric_sink::NoopMetricSink;
use echonet_lite::{Frame, LanController};

#[test]
fn bootstrap_then_discovery_then_polling_flows_end_to_end() {
    let controller = LanController::new();

    // Startup sequence: three bootstrap frames, each well-formed and with
    // a distinct, increasing TID.
    let bootstrap = controller.bootstrap_frames();
    for window in bootstrap.windows(2) {
        assert!(window[1].tid > window[0].tid);
    }

    // A peer announces itself with an Inf carrying its instance list.
    let announce: Vec<u8> = vec![
        0x10, 0x81, 0x00, 0x01, 0x0E, 0xF0, 0x01, 0x05, 0xFF, 0x01, 0x73, 0x01, 0xD5, 0x04, 0x01,
        0x01, 0x30, 0x01,
    ];
    let frame = Frame::parse(&announce).unwrap();
    controller.handle_frame("10.0.0.5", &frame, &NoopMetricSink);
    assert_eq!(controller.node_count(), 1);

    // Once known, the controller should be ready to poll that aircon.
    let polls = controller.poll_frames();
    assert_eq!(polls.len(), 1);
    assert_eq!(polls[0].0, "10.0.0.5");
}

use benchpoll_core::config::{InstrumentConfig, SessionConfig};
use benchpoll_core::engine::{Session, SessionState};
use benchpoll_core::sink::ChannelSink;
use benchpoll_core::transport::SimulatedInstrument;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_streams_readings_from_simulated_meter() {
    let config = SessionConfig::new(InstrumentConfig::new("SIM"));
    let (sink, mut rx) = ChannelSink::new(64);
    let session = Session::new(config, sink).unwrap();
    let token = session.cancellation_token();
    let meter = SimulatedInstrument::with_seed(2024).conversion_polls(2);

    let stopper = async {
        tokio::time::sleep(Duration::from_secs(40)).await;
        token.cancel();
    };
    let (report, ()) = tokio::join!(session.run(Box::new(meter)), stopper);

    assert_eq!(report.state, SessionState::Stopped);
    assert!(report.series.len() >= 5, "got {}", report.series.len());
    assert_eq!(report.diagnostics.error_count(), 0);

    let mut streamed = Vec::new();
    while let Ok(m) = rx.try_recv() {
        streamed.push(m);
    }
    assert_eq!(streamed.len(), report.series.len());
    for (position, (sent, kept)) in streamed.iter().zip(report.series.iter()).enumerate() {
        assert_eq!(sent.index, position as u64);
        assert_eq!(sent, kept);
        assert!((kept.value - 23.0).abs() < 1.0);
    }
}

#[tokio::test(start_paused = true)]
async fn test_noisy_meter_never_breaks_the_stream() {
    let config = SessionConfig::new(InstrumentConfig::new("SIM"));
    let (sink, _rx) = ChannelSink::new(256);
    let session = Session::new(config, sink).unwrap();
    let token = session.cancellation_token();
    let meter = SimulatedInstrument::with_seed(77)
        .conversion_polls(1)
        .glitch_probability(0.3);

    let stopper = async {
        tokio::time::sleep(Duration::from_secs(120)).await;
        token.cancel();
    };
    let (report, ()) = tokio::join!(session.run(Box::new(meter)), stopper);

    assert_eq!(report.state, SessionState::Stopped);
    assert!(report.diagnostics.decode_errors > 0);
    assert!(!report.series.is_empty());
    let indices: Vec<u64> = report.series.iter().map(|m| m.index).collect();
    let expected: Vec<u64> = (0..indices.len() as u64).collect();
    assert_eq!(indices, expected);
}

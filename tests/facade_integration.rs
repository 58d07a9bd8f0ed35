//! Integration tests for the fitting facade
//!
//! These tests drive the public API end to end:
//! - A full fitting sequence against a scripted engine
//! - Behaviour when the native library cannot be loaded
//! - Shared use of one facade from several threads

use std::sync::{Arc, Mutex};
use std::thread;

use nal2_bridge::config::BridgeConfig;
use nal2_bridge::context::FittingContext;
use nal2_bridge::diagnostics::{LogEvent, LogLevel};
use nal2_bridge::engine::{EntryPoint, StubEngine};
use nal2_bridge::error::{EngineError, ErrorCode};
use nal2_bridge::facade::Nal2Facade;
use nal2_bridge::types::{
    AidSetup, Audiogram, CompressionRatioRequest, CompressionThresholdRequest, GainRequest,
    VersionInfo,
};

const AUDIOGRAM: [f64; 9] = [20.0, 25.0, 30.0, 40.0, 50.0, 55.0, 60.0, 65.0, 70.0];

fn stub_facade(engine: StubEngine) -> (Nal2Facade, Arc<StubEngine>) {
    let engine = Arc::new(engine);
    let context = FittingContext::with_engine(BridgeConfig::default(), engine.clone());
    (Nal2Facade::new(Arc::new(context)), engine)
}

fn collect_events(facade: &Nal2Facade) -> Arc<Mutex<Vec<(String, LogLevel, String)>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    facade
        .context()
        .set_log_callback(Some(Arc::new(move |tag: &str, level: LogLevel, message: &str| {
            sink.lock()
                .unwrap()
                .push((tag.to_string(), level, message.to_string()));
        })));
    events
}

fn audiogram() -> Audiogram {
    Audiogram {
        ac: AUDIOGRAM.to_vec(),
        bc: AUDIOGRAM.to_vec(),
        ac_other: AUDIOGRAM.to_vec(),
    }
}

/// Settings, crossover, thresholds, ratios and gain in the order a fitting
/// screen issues them.
#[test]
fn test_full_fitting_sequence() {
    let crossover = vec![700.0, 1400.0, 2800.0, 0.0, 0.0];
    let ct = vec![45.0, 48.0, 50.0, 52.0];
    let cr = vec![1.8, 2.1, 2.4, 2.6];
    let reag = vec![12.0; 19];

    let (facade, engine) = stub_facade(
        StubEngine::new()
            .version(2, 1)
            .returning(EntryPoint::CrossOverFrequencies, crossover.clone())
            .returning(EntryPoint::CompressionThreshold, ct.clone())
            .returning(EntryPoint::CompressionRatio, cr.clone())
            .returning(EntryPoint::RealEarAidedGain, reag.clone()),
    );
    let events = collect_events(&facade);

    assert_eq!(facade.dll_version(), VersionInfo::new(2, 1));
    facade.set_adult_child(0, 19700101).unwrap();
    facade.set_experience(1).unwrap();
    facade.set_comp_speed(2).unwrap();
    facade.set_tonal_language(0).unwrap();
    facade.set_gender(1).unwrap();

    let result =
        facade.cross_over_frequencies(&[0.0; 5], 4, &AUDIOGRAM, &AUDIOGRAM, &[0; 19]);
    assert_eq!(result.cf_array, crossover);

    let mut threshold = vec![0.0; 4];
    facade
        .set_compression_threshold(
            &mut threshold,
            &CompressionThresholdRequest {
                calc_ch: vec![1, 1, 1, 1],
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(threshold, ct);

    let ratios = facade
        .compression_ratio(
            &[0.0; 4],
            &CompressionRatioRequest {
                centre_freq: vec![500, 1000, 2000, 4000],
                audiogram: audiogram(),
                aid: AidSetup {
                    channels: 4,
                    ..Default::default()
                },
            },
        )
        .unwrap();
    assert_eq!(ratios, cr);

    let gain = facade.real_ear_aided_gain(
        &[0.0; 19],
        &GainRequest {
            audiogram: audiogram(),
            level: 65.0,
            aid: AidSetup {
                channels: 4,
                ..Default::default()
            },
        },
    );
    assert_eq!(gain, reag);

    assert_eq!(engine.call_count(EntryPoint::SetGender), 1);
    let events = events.lock().unwrap();
    assert!(
        events.iter().all(|(_, level, _)| *level != LogLevel::Error),
        "unexpected error events: {:?}",
        *events
    );
    assert!(events
        .iter()
        .any(|(tag, level, message)| tag == "Nal2Facade"
            && *level == LogLevel::Debug
            && message.starts_with("CFArray: ")));
}

/// A missing shared library degrades calculators to their defaults and
/// surfaces as an error from setters.
#[test]
fn test_missing_library_degrades_gracefully() {
    let mut config = BridgeConfig::default();
    config.engine.library_path = "/nonexistent/libnal2_missing.so".to_string();
    let facade = Nal2Facade::new(Arc::new(FittingContext::new(config)));
    let events = collect_events(&facade);

    assert_eq!(facade.dll_version(), VersionInfo::new(2, 0));

    let mpo_in = vec![110.0; 19];
    assert_eq!(
        facade.mpo(&mpo_in, 1, &AUDIOGRAM, &AUDIOGRAM, 4, 1),
        mpo_in
    );
    assert_eq!(facade.tubing(1), vec![0.0; 19]);
    assert_eq!(facade.tubing9(1), vec![0.0; 9]);
    assert_eq!(facade.center_frequencies(3, &[0.0; 19]), vec![0, 0, 0]);

    let err = facade.set_gender(1).unwrap_err();
    assert!(matches!(err, EngineError::LibraryLoad { .. }));
    assert_eq!(err.code(), 3006);
    assert!(!facade.context().is_engine_ready());

    let events = events.lock().unwrap();
    assert!(events
        .iter()
        .any(|(_, level, message)| *level == LogLevel::Error
            && message.starts_with("getMPO_NL2 failed")));
}

#[test]
fn test_facade_is_shared_across_threads() {
    let (facade, engine) = stub_facade(
        StubEngine::new().returning(EntryPoint::GetTubing, vec![1.0; 19]),
    );

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let facade = facade.clone();
            thread::spawn(move || facade.tubing(2))
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), vec![1.0; 19]);
    }
    assert_eq!(engine.call_count(EntryPoint::GetTubing), 8);
}

#[test]
fn test_history_records_absorbed_failures() {
    let (facade, _engine) = stub_facade(StubEngine::new().failing(EntryPoint::GetMle, "bad mic"));

    assert_eq!(facade.mle(1, 0, 0), vec![0.0; 19]);

    let snapshot = facade.context().sink().snapshot();
    let failure: &LogEvent = snapshot
        .recent
        .iter()
        .find(|event| event.level == LogLevel::Error)
        .expect("error event recorded");
    assert_eq!(failure.message, "GetMLE failed");
    assert!(failure.cause.as_deref().unwrap_or("").contains("bad mic"));
}

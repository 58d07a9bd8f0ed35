use std::sync::{Arc, Mutex};

use super::*;
use crate::config::BridgeConfig;
use crate::diagnostics::{LogEvent, LogLevel};
use crate::engine::{FittingEngine, StubEngine};
use crate::types::{
    Audiogram, AidSetup, CompressionRatioRequest, CompressionThresholdRequest, CouplerGainRequest,
    CurveRequest, GainAtRequest, GainRequest, RecdRequest, CURVE_POINTS,
};

const AC: [f64; 9] = [20.0, 25.0, 30.0, 35.0, 40.0, 50.0, 55.0, 60.0, 65.0];
const BC: [f64; 9] = [15.0, 20.0, 25.0, 30.0, 35.0, 45.0, 50.0, 55.0, 60.0];

fn facade_with(engine: StubEngine) -> (Nal2Facade, Arc<StubEngine>) {
    let engine = Arc::new(engine);
    let shared: Arc<dyn FittingEngine> = engine.clone();
    let context = Arc::new(FittingContext::with_engine(BridgeConfig::default(), shared));
    (Nal2Facade::new(context), engine)
}

fn events(facade: &Nal2Facade, level: LogLevel) -> Vec<LogEvent> {
    facade
        .context()
        .sink()
        .snapshot()
        .recent
        .into_iter()
        .filter(|event| event.level == level)
        .collect()
}

fn fixed_mpo() -> Vec<f64> {
    (0..19).map(|i| 90.0 + i as f64).collect()
}

fn ratio_request(centre_freq: Vec<i32>, ac: Vec<f64>, bc: Vec<f64>, ac_other: Vec<f64>) -> CompressionRatioRequest {
    CompressionRatioRequest {
        centre_freq,
        audiogram: Audiogram { ac, bc, ac_other },
        aid: AidSetup {
            channels: 3,
            limiting: 1,
            ..AidSetup::default()
        },
    }
}

#[test]
fn mpo_returns_the_engine_output_exactly() {
    let (facade, stub) = facade_with(StubEngine::new().returning(EntryPoint::Mpo, fixed_mpo()));
    let result = facade.mpo(&[0.0; 19], 1, &AC, &BC, 6, 1);

    assert_eq!(result, fixed_mpo());
    assert_eq!(stub.call_count(EntryPoint::Mpo), 1);
    let debug = events(&facade, LogLevel::Debug);
    assert_eq!(debug[0].message, "getMPO_NL2: type=1, channels=6, limiting=1");
    assert!(events(&facade, LogLevel::Error).is_empty());
}

#[test]
fn mpo_failure_returns_the_input_and_logs_one_error() {
    let (facade, _) = facade_with(StubEngine::new().failing(EntryPoint::Mpo, "native exception"));
    let input: Vec<f64> = (0..19).map(|i| i as f64 * 0.5).collect();

    let result = facade.mpo(&input, 1, &AC, &BC, 6, 1);

    assert_eq!(result, input);
    let errors = events(&facade, LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "getMPO_NL2 failed");
    assert!(errors[0].cause.as_deref().unwrap_or_default().contains("native exception"));
}

#[test]
fn raw_field_result_is_returned_with_a_warning() {
    let (facade, _) = facade_with(StubEngine::new().raw_field_only(EntryPoint::GetMle, vec![7.0; 19]));
    assert_eq!(facade.mle(1, 0, 0), vec![7.0; 19]);
    assert_eq!(events(&facade, LogLevel::Warn).len(), 1);
    assert!(events(&facade, LogLevel::Error).is_empty());
}

#[test]
fn unreadable_result_falls_back_to_the_buffer() {
    let (facade, _) = facade_with(StubEngine::new().broken_output(EntryPoint::RealEarInsertionGain));
    let reig = vec![3.0; 19];
    let request = GainRequest {
        audiogram: Audiogram {
            ac: AC.to_vec(),
            bc: BC.to_vec(),
            ac_other: AC.to_vec(),
        },
        level: 65.0,
        aid: AidSetup::default(),
    };

    assert_eq!(facade.real_ear_insertion_gain(&reig, &request), reig);
    assert_eq!(events(&facade, LogLevel::Error).len(), 1);
}

#[test]
fn unreadable_result_keeps_what_the_engine_wrote() {
    let (facade, _) = facade_with(
        StubEngine::new().unreadable_after_writing(EntryPoint::GetTubing, vec![1.5; 19]),
    );
    assert_eq!(facade.tubing(2), vec![1.5; 19]);
}

#[test]
fn compression_ratio_rejects_each_malformed_argument() {
    let (facade, stub) = facade_with(StubEngine::new());
    let nine = AC.to_vec();
    let mut negative_channels = ratio_request(Vec::new(), nine.clone(), nine.clone(), nine.clone());
    negative_channels.aid.channels = -1;
    let cases = [
        (ratio_request(vec![500, 1000], nine.clone(), nine.clone(), nine.clone()), "centreFreq", 3, 2),
        (ratio_request(vec![500, 1000, 2000], vec![0.0; 8], nine.clone(), nine.clone()), "AC", 9, 8),
        (ratio_request(vec![500, 1000, 2000], nine.clone(), vec![0.0; 10], nine.clone()), "BC", 9, 10),
        (ratio_request(vec![500, 1000, 2000], nine.clone(), nine.clone(), Vec::new()), "ACother", 9, 0),
        (negative_channels, "centreFreq", -1, 0),
    ];

    for (request, argument, expected, actual) in cases {
        let err = facade.compression_ratio(&[0.0; 19], &request).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidShape {
                argument,
                expected,
                actual
            }
        );
        assert!(err.is_caller_error());
    }

    assert_eq!(stub.call_count(EntryPoint::CompressionRatio), 0);
    assert_eq!(events(&facade, LogLevel::Error).len(), 5);
}

#[test]
fn compression_ratio_calls_the_engine_when_shapes_match() {
    let (facade, _) = facade_with(StubEngine::new().returning(EntryPoint::CompressionRatio, vec![2.0; 19]));
    let request = ratio_request(vec![500, 1000, 2000], AC.to_vec(), BC.to_vec(), AC.to_vec());
    assert_eq!(facade.compression_ratio(&[0.0; 19], &request).unwrap(), vec![2.0; 19]);

    let debug = events(&facade, LogLevel::Debug);
    assert!(debug[0].message.starts_with("CompressionRatio_NL2: channels=3, centreFreq length=3"));
}

#[test]
fn dll_version_defaults_when_unsupported() {
    let (facade, stub) = facade_with(StubEngine::new().missing(EntryPoint::DllVersion));
    assert_eq!(facade.dll_version(), VersionInfo::new(2, 0));
    assert_eq!(stub.call_count(EntryPoint::DllVersion), 0);
    assert!(events(&facade, LogLevel::Warn)
        .iter()
        .any(|event| event.message.starts_with("dllVersion not available")));
}

#[test]
fn dll_version_reports_the_queried_value() {
    let (facade, _) = facade_with(StubEngine::new().version(2, 7));
    assert_eq!(facade.dll_version(), VersionInfo::new(2, 7));

    let (facade, _) = facade_with(StubEngine::new().failing(EntryPoint::DllVersion, "bad"));
    assert_eq!(facade.dll_version(), VersionInfo::new(2, 0));
    assert_eq!(events(&facade, LogLevel::Error).len(), 1);
}

#[test]
fn second_callback_replaces_the_first() {
    let (facade, _) = facade_with(StubEngine::new().failing(EntryPoint::GainAt, "boom"));
    let first = Arc::new(Mutex::new(Vec::<String>::new()));
    let second = Arc::new(Mutex::new(Vec::<(String, LogLevel, String)>::new()));

    let sink_first = Arc::clone(&first);
    facade.context().set_log_callback(Some(Arc::new(move |_: &str, _, message: &str| {
        sink_first.lock().unwrap().push(message.to_string());
    })));
    // Acquire the engine so its INFO line lands on the first callback only.
    facade.context().engine().unwrap();

    let sink_second = Arc::clone(&second);
    facade.context().set_log_callback(Some(Arc::new(move |tag: &str, level, message: &str| {
        sink_second
            .lock()
            .unwrap()
            .push((tag.to_string(), level, message.to_string()));
    })));

    assert_eq!(facade.gain_at(&GainAtRequest::default()), 0.0);

    assert_eq!(first.lock().unwrap().len(), 1);
    let second = second.lock().unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].0, "Nal2Facade");
    assert_eq!(second[0].1, LogLevel::Error);
    assert!(second[0].2.starts_with("GainAt_NL2 failed: "));
}

#[test]
fn setters_propagate_engine_errors() {
    let (facade, _) = facade_with(
        StubEngine::new()
            .failing(EntryPoint::SetGender, "out of range")
            .missing(EntryPoint::SetTonalLanguage),
    );

    assert_eq!(
        facade.set_gender(7),
        Err(EngineError::fault("SetGender", "out of range"))
    );
    assert!(facade.set_tonal_language(1).unwrap_err().is_unsupported());
    assert!(facade.set_experience(1).is_ok());
    assert!(facade.set_adult_child(0, 20100101).is_ok());
}

#[test]
fn compression_threshold_fills_the_caller_buffer() {
    let (facade, _) = facade_with(StubEngine::new().returning(EntryPoint::CompressionThreshold, vec![45.0; 19]));
    let mut ct = vec![0.0; 19];
    facade
        .set_compression_threshold(&mut ct, &CompressionThresholdRequest::default())
        .unwrap();
    assert_eq!(ct, vec![45.0; 19]);
}

#[test]
fn scalar_calculators_default_to_zero() {
    let (facade, _) = facade_with(
        StubEngine::new()
            .scalar(EntryPoint::SpeechIntelligibility, 0.62)
            .panicking(EntryPoint::SpeechIntelligibilityIndex, "abort"),
    );
    assert_eq!(facade.speech_intelligibility(1, &[0.0; 19], &[0.0; 19]), 0.62);
    assert_eq!(facade.speech_intelligibility_index(&Default::default()), 0.0);
    assert_eq!(events(&facade, LogLevel::Error).len(), 1);
}

#[test]
fn unsupported_calculators_warn_and_default() {
    let (facade, _) = facade_with(StubEngine::new().missing(EntryPoint::GetVentOut9));
    assert_eq!(facade.vent_out9(1), vec![0.0; 9]);
    assert!(events(&facade, LogLevel::Error).is_empty());
    assert!(events(&facade, LogLevel::Warn)
        .iter()
        .any(|event| event.message == "GetVentOut9_NL2 not available in this engine build"));
}

#[test]
fn crossover_logs_both_arrays() {
    let (facade, _) = facade_with(StubEngine::new().returning_classified(
        EntryPoint::CrossOverFrequencies,
        vec![700.0, 1400.0],
        vec![0, 0, 1, 1, 2],
    ));
    let result = facade.cross_over_frequencies(&[0.0; 2], 3, &AC, &BC, &[0; 5]);

    assert_eq!(result.cf_array, vec![700.0, 1400.0]);
    assert_eq!(result.freq_in_ch, vec![0, 0, 1, 1, 2]);
    let debug: Vec<String> = events(&facade, LogLevel::Debug)
        .into_iter()
        .map(|event| event.message)
        .collect();
    assert_eq!(debug, vec!["CFArray: [700.0, 1400.0]", "FreqInCh: [0, 0, 1, 1, 2]"]);
}

#[test]
fn center_frequencies_returns_zeros_on_failure() {
    let (facade, _) = facade_with(StubEngine::new().failing(EntryPoint::CenterFrequencies, "bad"));
    assert_eq!(facade.center_frequencies(4, &[1000.0; 3]), vec![0; 4]);

    let (facade, _) = facade_with(StubEngine::new().returning_classified(
        EntryPoint::CenterFrequencies,
        Vec::new(),
        vec![250, 1000, 4000],
    ));
    assert_eq!(facade.center_frequencies(3, &[500.0, 2000.0]), vec![250, 1000, 4000]);
}

#[test]
fn coupler_gain_carries_line_type() {
    let (facade, _) = facade_with(StubEngine::new().returning_classified(
        EntryPoint::EarSimulatorGain,
        vec![12.0; 19],
        vec![1; 19],
    ));
    let result = facade.ear_simulator_gain(&[0.0; 19], &CouplerGainRequest::default(), &[0; 19]);
    assert_eq!(result.gain, vec![12.0; 19]);
    assert_eq!(result.line_type, vec![1; 19]);

    let (facade, _) = facade_with(StubEngine::new().failing(EntryPoint::TccCouplerGain, "bad"));
    let result = facade.tcc_coupler_gain(&[4.0; 19], &CouplerGainRequest::default(), &[2; 19]);
    assert_eq!(result.gain, vec![4.0; 19]);
    assert_eq!(result.line_type, vec![2; 19]);
}

#[test]
fn curves_default_to_zeroed_engine_lengths() {
    let (facade, _) = facade_with(StubEngine::new().failing(EntryPoint::TccInputOutputCurve, "bad"));
    let curve = facade.tcc_input_output_curve(&CurveRequest::default());
    assert_eq!(curve.io, vec![0.0; CURVE_POINTS]);
    assert_eq!(curve.line_type, vec![0; CURVE_POINTS]);

    let (facade, _) = facade_with(StubEngine::new().returning(EntryPoint::RealEarInputOutputCurve, vec![60.0; 100]));
    let curve = facade.real_ear_input_output_curve(&CurveRequest::default());
    assert_eq!(curve.io, vec![60.0; 100]);
    assert_eq!(curve.io_unl.len(), CURVE_POINTS);
}

#[test]
fn recd_outputs_are_nine_points_on_both_grids() {
    let (facade, _) = facade_with(StubEngine::new());
    assert_eq!(facade.recdh_indiv(&RecdRequest::default()).len(), 9);
    assert_eq!(facade.recdt_indiv9(&RecdRequest::default()).len(), 9);
    assert_eq!(facade.redd_indiv(1).len(), 19);
    assert_eq!(facade.redd_indiv9(1).len(), 9);
}

#[test]
fn return_values_extracts_maf_and_echoes_the_rest() {
    let (facade, _) = facade_with(StubEngine::new().returning(EntryPoint::ReturnValues, vec![5.0; 19]));
    let values = facade.return_values();
    assert_eq!(values.maf, vec![5.0; 19]);
    assert_eq!(values.bwc, vec![0.0; 19]);
    assert_eq!(values.escd, vec![0.0; 19]);
}

#[test]
fn missing_library_is_absorbed_by_calculators() {
    let mut config = BridgeConfig::default();
    config.engine.library_path = "/nonexistent/libnal2.so".to_string();
    let facade = Nal2Facade::new(Arc::new(FittingContext::new(config)));

    assert_eq!(facade.mle(0, 0, 0), vec![0.0; 19]);
    assert_eq!(facade.dll_version(), VersionInfo::new(2, 0));
    assert!(facade.set_gender(1).is_err());
}

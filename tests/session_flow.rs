mod support;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use lightsout::camera::DeviceError;
use lightsout::config::AppConfig;
use lightsout::label::Label;
use lightsout::ml::FitError;
use lightsout::session::{
    CaptureError, ClassifierState, Session, SessionEvent, SystemState, TrainerEvent,
    TrainingCounts, TrainingError,
};
use support::camera::{CameraHandle, ScriptedCamera};
use support::models::{FailingClassifier, PanelClassifier, PanelExtractor};
use support::ms;

fn session() -> (Session, CameraHandle) {
    let (camera, handle) = ScriptedCamera::new();
    let mut session = Session::new(AppConfig::default(), Box::new(camera));
    session.install_extractor(Box::new(PanelExtractor { ready: true }));
    session.install_classifier(Box::new(PanelClassifier::new()));
    session.acquire_camera().unwrap();
    (session, handle)
}

/// Run a default burst (5 samples, 150 ms apart) starting at `start`.
fn capture_burst(
    session: &mut Session,
    camera: &CameraHandle,
    label: Label,
    start: Instant,
) -> Vec<SessionEvent> {
    camera.show(label);
    session.start_capture(label, start);
    let mut events = Vec::new();
    for sample in 0..5 {
        events.extend(session.tick(start + ms(150 * sample)));
    }
    events
}

#[test]
fn five_of_each_label_trains_to_ready_with_ordered_epochs() {
    let (mut session, camera) = session();
    let t0 = Instant::now();
    camera.show(Label::Hold);
    session.tick(t0);
    let status = session.status();
    assert_eq!(status.camera_status, SystemState::DriverCameraReady);
    assert_eq!(status.model_status, SystemState::AddTrainingData);

    let events = capture_burst(&mut session, &camera, Label::Hold, t0);
    let captured: Vec<u64> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::SampleCaptured {
                label: Label::Hold,
                total,
            } => Some(*total),
            _ => None,
        })
        .collect();
    assert_eq!(captured, vec![1, 2, 3, 4, 5]);
    assert_eq!(session.status().model_status, SystemState::AddTrainingData);

    capture_burst(&mut session, &camera, Label::Go, t0 + ms(1_000));
    let status = session.status();
    assert_eq!(status.training_counts, TrainingCounts { hold: 5, go: 5 });
    assert_eq!(status.model_status, SystemState::TrainModel);
    assert_eq!(session.classifier_state(), ClassifierState::Uninitialized);

    session.train().unwrap();
    assert_eq!(session.classifier_state(), ClassifierState::Training);
    let events = session.wait_for_training(Duration::from_secs(10));
    let epochs: Vec<usize> = events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Training(TrainerEvent::Epoch(report)) => Some(report.epoch),
            _ => None,
        })
        .collect();
    assert_eq!(epochs, (0..10).collect::<Vec<_>>());
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Training(TrainerEvent::Completed {
            examples: 10
        }))
    );
    assert_eq!(session.classifier_state(), ClassifierState::Ready);
    assert!(session.prediction().is_enabled());

    let status = session.status();
    assert_eq!(status.model_status, SystemState::TrainModel);
    assert_eq!(status.current_epoch, Some(9));
    assert!(status.current_metrics.is_some());
}

#[test]
fn features_and_labels_stay_paired_and_counters_never_drop() {
    let (mut session, camera) = session();
    let t0 = Instant::now();
    camera.show(Label::Hold);
    session.start_capture(Label::Hold, t0);
    session.start_capture(Label::Go, t0 + ms(75));

    let mut previous = TrainingCounts::default();
    for step in 0..20 {
        let label = if step % 3 == 0 { Label::Go } else { Label::Hold };
        camera.show(label);
        session.tick(t0 + ms(step * 40));
        let set = session.training_set();
        assert_eq!(set.features().len(), set.labels().len());
        let counts = set.counts();
        assert!(counts.hold >= previous.hold);
        assert!(counts.go >= previous.go);
        previous = counts;
    }
    assert_eq!(previous, TrainingCounts { hold: 5, go: 5 });
}

#[test]
fn capture_before_stream_is_live_is_a_silent_no_op() {
    let (mut session, _camera) = session();
    let t0 = Instant::now();
    session.start_capture(Label::Hold, t0);
    let mut events = Vec::new();
    for sample in 0..5 {
        events.extend(session.tick(t0 + ms(150 * sample)));
    }
    assert!(events.is_empty());
    assert!(session.training_set().is_empty());
    assert_eq!(session.status().camera_status, SystemState::Loading);
    assert_eq!(session.next_deadline(), None);
}

#[test]
fn detached_slot_fails_every_sample_and_errors_the_camera() {
    let (mut session, camera) = session();
    let t0 = Instant::now();
    session.detach_slot(Label::Go);
    let events = capture_burst(&mut session, &camera, Label::Go, t0);
    let failures = events
        .iter()
        .filter(|event| {
            **event
                == SessionEvent::CaptureFailed(CaptureError::SlotUnavailable {
                    slot: 1,
                    label: Label::Go,
                })
        })
        .count();
    assert_eq!(failures, 5);
    assert_eq!(session.training_set().counts().go, 0);
    let status = session.status();
    assert_eq!(status.camera_status, SystemState::Error);
    assert_eq!(status.overall(), SystemState::Error);
    assert!(!session.prediction().is_armed());
}

#[test]
fn slot_keeps_latest_snapshot() {
    let (mut session, camera) = session();
    capture_burst(&mut session, &camera, Label::Hold, Instant::now());
    let slot = session.slot(Label::Hold);
    assert_eq!(slot.captured(), 5);
    assert_eq!(slot.snapshot().map(|image| image.dimensions()), Some((200, 200)));
    assert!(session.slot(Label::Go).snapshot().is_none());
}

#[test]
fn training_an_empty_set_is_rejected_without_state_change() {
    let (mut session, camera) = session();
    camera.show(Label::Hold);
    session.tick(Instant::now());
    assert_eq!(session.train(), Err(TrainingError::EmptyTrainingSet));
    assert_eq!(session.classifier_state(), ClassifierState::Uninitialized);
    assert_eq!(session.status().model_status, SystemState::Error);
}

#[test]
fn second_train_call_while_fitting_is_rejected() {
    let (mut session, camera) = session();
    let t0 = Instant::now();
    capture_burst(&mut session, &camera, Label::Hold, t0);
    capture_burst(&mut session, &camera, Label::Go, t0 + ms(1_000));
    session.train().unwrap();
    assert_eq!(session.train(), Err(TrainingError::AlreadyTraining));
    assert_eq!(session.classifier_state(), ClassifierState::Training);
    session.wait_for_training(Duration::from_secs(10));
    assert_eq!(session.classifier_state(), ClassifierState::Ready);
    assert_eq!(session.status().model_status, SystemState::Error);
}

#[test]
fn failed_fit_restores_state_and_reports_error() {
    let (camera, handle) = ScriptedCamera::new();
    let mut session = Session::new(AppConfig::default(), Box::new(camera));
    session.install_extractor(Box::new(PanelExtractor { ready: true }));
    session.install_classifier(Box::new(FailingClassifier));
    session.acquire_camera().unwrap();
    let t0 = Instant::now();
    capture_burst(&mut session, &handle, Label::Hold, t0);
    capture_burst(&mut session, &handle, Label::Go, t0 + ms(1_000));

    session.train().unwrap();
    assert_eq!(session.classifier_state(), ClassifierState::Training);
    let events = session.wait_for_training(Duration::from_secs(10));
    assert_eq!(
        events,
        vec![SessionEvent::Training(TrainerEvent::Failed(
            TrainingError::Fit(FitError::Diverged { epoch: 0 })
        ))]
    );
    assert_eq!(session.classifier_state(), ClassifierState::Uninitialized);
    assert!(!session.prediction().is_enabled());
    assert_eq!(session.status().model_status, SystemState::Error);
}

#[test]
fn retraining_keeps_the_previous_model_serving_until_the_fit_lands() {
    let (camera, handle) = ScriptedCamera::new();
    let classifier = PanelClassifier::new();
    let fits = classifier.fits.clone();
    let hold_fit = classifier.hold_fit.clone();
    let mut session = Session::new(AppConfig::default(), Box::new(camera));
    session.install_extractor(Box::new(PanelExtractor { ready: true }));
    session.install_classifier(Box::new(classifier));
    session.acquire_camera().unwrap();
    let t0 = Instant::now();
    capture_burst(&mut session, &handle, Label::Hold, t0);
    capture_burst(&mut session, &handle, Label::Go, t0 + ms(1_000));
    session.train().unwrap();
    session.wait_for_training(Duration::from_secs(10));
    assert_eq!(session.classifier_state(), ClassifierState::Ready);
    assert_eq!(fits.load(Ordering::SeqCst), 1);

    hold_fit.store(true, Ordering::SeqCst);
    session.train().unwrap();
    assert_eq!(session.classifier_state(), ClassifierState::Training);

    handle.show(Label::Go);
    session.tick(t0 + ms(2_000));
    assert_eq!(session.control_signal(), Some(Label::Go));
    handle.show(Label::Hold);
    session.tick(t0 + ms(2_016));
    assert_eq!(session.control_signal(), Some(Label::Hold));
    assert_eq!(session.classifier_state(), ClassifierState::Training);
    assert_eq!(fits.load(Ordering::SeqCst), 1);

    hold_fit.store(false, Ordering::SeqCst);
    let events = session.wait_for_training(Duration::from_secs(10));
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Training(TrainerEvent::Completed {
            examples: 10
        }))
    );
    assert_eq!(session.classifier_state(), ClassifierState::Ready);
    assert_eq!(fits.load(Ordering::SeqCst), 2);
    assert_eq!(session.status().model_status, SystemState::TrainModel);
}

#[test]
fn training_without_a_classifier_is_rejected() {
    let (camera, handle) = ScriptedCamera::new();
    let mut session = Session::new(AppConfig::default(), Box::new(camera));
    session.install_extractor(Box::new(PanelExtractor { ready: true }));
    session.acquire_camera().unwrap();
    capture_burst(&mut session, &handle, Label::Hold, Instant::now());
    assert_eq!(session.train(), Err(TrainingError::ClassifierMissing));
    assert_eq!(session.classifier_state(), ClassifierState::Uninitialized);
}

#[test]
fn model_status_waits_for_the_extractor() {
    let (camera, handle) = ScriptedCamera::new();
    let mut session = Session::new(AppConfig::default(), Box::new(camera));
    session.install_extractor(Box::new(PanelExtractor { ready: false }));
    session.install_classifier(Box::new(PanelClassifier::new()));
    session.acquire_camera().unwrap();
    handle.show(Label::Hold);
    session.tick(Instant::now());
    let status = session.status();
    assert_eq!(status.camera_status, SystemState::DriverCameraReady);
    assert_eq!(status.model_status, SystemState::Loading);
}

#[test]
fn denied_camera_is_terminal() {
    let mut session = Session::new(AppConfig::default(), Box::new(ScriptedCamera::denied()));
    assert!(matches!(
        session.acquire_camera(),
        Err(DeviceError::PermissionDenied)
    ));
    session.tick(Instant::now());
    let status = session.status();
    assert_eq!(status.camera_status, SystemState::Error);
    assert_eq!(status.overall(), SystemState::Error);
}

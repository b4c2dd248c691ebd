mod support;

use std::time::{Duration, Instant};

use lightsout::config::AppConfig;
use lightsout::label::Label;
use lightsout::session::{ClassifierState, Session, SystemState};
use support::camera::ScriptedCamera;
use support::ms;

#[test]
fn bundled_models_learn_synthetic_gestures() {
    let mut config = AppConfig::default();
    config.training.seed = Some(9);
    config.training.hidden_size = 32;
    config.training.epochs = 20;
    let (camera, handle) = ScriptedCamera::new();
    let mut session = Session::with_default_models(config, Box::new(camera));
    session.acquire_camera().unwrap();

    let t0 = Instant::now();
    for (offset, label) in [(0, Label::Hold), (1_000, Label::Go)] {
        let start = t0 + ms(offset);
        session.start_capture(label, start);
        for sample in 0..5 {
            handle.show(label);
            session.tick(start + ms(150 * sample));
        }
    }
    assert_eq!(session.status().model_status, SystemState::TrainModel);

    session.train().unwrap();
    session.wait_for_training(Duration::from_secs(60));
    assert_eq!(session.classifier_state(), ClassifierState::Ready);

    let mut now = t0 + ms(2_000);
    for label in [Label::Go, Label::Hold, Label::Go] {
        handle.show(label);
        now += ms(16);
        session.tick(now);
        assert_eq!(session.control_signal(), Some(label));
    }
}

use guide_core::model::{
    AssessmentId, GuideSettings, GuideSettingsDraft, ModuleId, RegistrationDraft, SectionId,
};
use guide_core::time::fixed_clock;
use serde_json::json;
use services::{AppServices, ProgressError, ProgressOrigin};

fn local_settings(db: &str) -> GuideSettings {
    GuideSettingsDraft {
        mode: Some("local".into()),
        database_url: Some(format!("sqlite:file:{db}?mode=memory&cache=shared")),
        ..GuideSettingsDraft::default()
    }
    .validate()
    .unwrap()
}

fn section(id: &str) -> SectionId {
    SectionId::new(id).unwrap()
}

fn module(id: &str) -> ModuleId {
    ModuleId::new(id).unwrap()
}

#[tokio::test]
async fn demo_session_and_progress_survive_restart() {
    let settings = local_settings("memdb_local_flow_restart");
    let app = AppServices::new_sqlite(settings.clone(), fixed_clock())
        .await
        .expect("open app");

    assert_eq!(app.start().await.unwrap(), None);
    let progress = app.progress();
    assert!(progress.is_resolved());
    assert!(!progress.is_signed_in());

    let session = app.login("ada@example.com", "secret").await.unwrap();
    assert_eq!(session.identity.name, "ada");
    assert_eq!(progress.origin(), ProgressOrigin::Snapshot);

    progress
        .toggle_section(&section("basics-1"), &module("pm-basics"), true)
        .await
        .unwrap();
    progress
        .submit_assessment(&AssessmentId::new("rice-quiz").unwrap(), json!({"q": 1}), 90.0)
        .await
        .unwrap();

    // A second process over the same database resumes the session.
    let restarted = AppServices::new_sqlite(settings, fixed_clock())
        .await
        .expect("reopen app");
    let restored = restarted.start().await.unwrap();
    assert_eq!(restored, Some(session));

    let progress = restarted.progress();
    assert!(progress.is_module_completed(&module("pm-basics")));
    assert!(progress.is_section_completed(&section("basics-1")));
    assert_eq!(
        progress.assessment_score(&AssessmentId::new("rice-quiz").unwrap()),
        Some(90.0)
    );
    assert!((progress.total_progress() - 100.0 / 6.0).abs() < 1e-9);
}

#[tokio::test]
async fn logout_clears_progress_and_anonymous_changes_stay_in_memory() {
    let app = AppServices::new_sqlite(local_settings("memdb_local_flow_logout"), fixed_clock())
        .await
        .expect("open app");
    app.start().await.unwrap();

    app.register(RegistrationDraft {
        name: "Grace".into(),
        email: "grace@example.com".into(),
        password: "hopper".into(),
    })
    .await
    .unwrap();
    let progress = app.progress();
    progress
        .toggle_section(&section("discovery-1"), &module("discovery"), true)
        .await
        .unwrap();

    app.logout().await.unwrap();
    assert!(!progress.is_signed_in());
    assert!(progress.snapshot().module_progress.is_empty());
    assert!(progress.total_progress().abs() < f64::EPSILON);
    assert!(matches!(
        progress.load_progress().await.unwrap_err(),
        ProgressError::NotSignedIn
    ));

    progress
        .toggle_section(&section("metrics-1"), &module("metrics"), true)
        .await
        .unwrap();
    assert_eq!(progress.origin(), ProgressOrigin::Ephemeral);
    assert!((progress.total_progress() - 100.0 / 6.0).abs() < 1e-9);

    assert_eq!(app.start().await.unwrap(), None);
}

#[tokio::test]
async fn browse_mode_flag_is_not_persisted() {
    let settings = local_settings("memdb_local_flow_browse");
    let app = AppServices::new_sqlite(settings.clone(), fixed_clock())
        .await
        .expect("open app");
    app.start().await.unwrap();

    app.auth().enable_browse_mode().await.unwrap();
    assert!(app.auth().browse_mode().await.unwrap());

    let restarted = AppServices::new_sqlite(settings, fixed_clock())
        .await
        .expect("reopen app");
    assert!(!restarted.auth().browse_mode().await.unwrap());
}

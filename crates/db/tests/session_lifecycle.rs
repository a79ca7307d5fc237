//! Persistence of a session across a full generate → plan → apply flow.

use std::path::PathBuf;

use terraloom_core::config::DatabaseConfig;
use terraloom_core::{Intent, Session, SessionId};
use terraloom_db::{connect, migrations, SessionRepository, SqlSessionRepository};

async fn repository() -> SqlSessionRepository {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        timeout_secs: 30,
    };
    let pool = connect(&config).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrate");
    SqlSessionRepository::new(pool)
}

#[tokio::test]
async fn session_survives_each_stage_of_the_flow() {
    let repo = repository().await;
    let id = SessionId("s-flow".to_string());
    let mut session = Session::new(id.clone(), PathBuf::from("/tmp/s-flow"));

    // Turn 1: generation.
    session.push_user_turn("Create a t2.micro EC2 instance named 'api-server'");
    session.last_intent = Some(Intent::CodeModification);
    session.iac_code = "provider \"aws\" { region = \"us-east-1\" }".to_string();
    session.iac_diagram_path = "/tmp/s-flow/architecture_diagram.png".to_string();
    session.push_assistant_turn("I have updated the architecture based on your request.");
    repo.save(&session).await.expect("save after generation");

    // Plan invalidates any previous apply record.
    let mut session = repo.load(&id).await.expect("load").expect("present");
    session.plan_output = "Plan: 1 to add, 0 to change, 0 to destroy.".to_string();
    session.apply_output.clear();
    repo.save(&session).await.expect("save after plan");

    // Apply consumes the plan.
    let mut session = repo.load(&id).await.expect("load").expect("present");
    assert!(session.plan_output.contains("1 to add"));
    session.apply_output = "Apply complete! Resources: 1 added.".to_string();
    session.plan_output.clear();
    repo.save(&session).await.expect("save after apply");

    let finished = repo.load(&id).await.expect("load").expect("present");
    assert_eq!(finished.history.len(), 2);
    assert_eq!(finished.last_intent, Some(Intent::CodeModification));
    assert!(finished.iac_code.contains("provider"));
    assert!(finished.plan_output.is_empty());
    assert!(finished.apply_output.contains("Apply complete"));

    let listed = repo.list().await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "Create a t2.micro EC2 instance named 'api-server'");
}

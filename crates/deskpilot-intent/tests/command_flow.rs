//! Interpret-then-execute against the recording backend.

use std::path::Path;
use std::sync::Arc;

use deskpilot_adapters::{ActionSurface, Allowlist, DesktopEvent, DryRunDesktop, PanicSwitch};
use deskpilot_intent::{ActionStep, CommandInterpreter, PlanExecutor};

fn executor(desktop: Arc<DryRunDesktop>, shots: &Path, panic: Arc<PanicSwitch>) -> PlanExecutor {
    let surface = ActionSurface::new(desktop)
        .with_allowlist(Allowlist::new([("notepad", vec!["gedit".to_owned()])]))
        .with_shots_dir(shots)
        .with_panic_switch(panic);
    PlanExecutor::new(Arc::new(surface))
}

#[tokio::test(start_paused = true)]
async fn typed_text_then_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Arc::new(DryRunDesktop::new());
    let interpreter = CommandInterpreter::new().unwrap();

    let plan = interpreter.interpret(r#"tape "Bonjour" et screenshot"#);
    assert_eq!(
        plan,
        vec![
            ActionStep::type_text("Bonjour"),
            ActionStep::sleep(0.4),
            ActionStep::Screenshot,
        ]
    );

    let outcome = executor(desktop.clone(), dir.path(), Arc::default())
        .execute(&plan)
        .await;
    assert!(outcome.ok());

    let last = outcome.results.last().unwrap();
    assert_eq!(last["url"], "/shots/shot.png");
    let path = last["path"].as_str().unwrap();
    assert!(Path::new(path).exists());
    assert_eq!(desktop.events()[0], DesktopEvent::Typed("Bonjour".into()));
}

#[tokio::test(start_paused = true)]
async fn open_notepad_launches_and_focuses() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Arc::new(DryRunDesktop::new().with_windows(["Google Chrome", "Sans titre - Bloc-notes"]));
    let plan = CommandInterpreter::new().unwrap().interpret("ouvre notepad puis écris bonjour");

    let outcome = executor(desktop.clone(), dir.path(), Arc::default())
        .execute(&plan)
        .await;
    assert!(outcome.ok(), "{:?}", outcome.results);
    assert_eq!(
        desktop.events(),
        vec![
            DesktopEvent::Spawned(vec!["gedit".into()]),
            DesktopEvent::Activated("Sans titre - Bloc-notes".into()),
            DesktopEvent::Typed("bonjour".into()),
        ]
    );
}

#[tokio::test]
async fn panic_means_no_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Arc::new(DryRunDesktop::new().with_windows(["Google Chrome"]));
    let plan = CommandInterpreter::new()
        .unwrap()
        .interpret("ouvre youtube et tape bonjour et capture");
    assert!(!plan.is_empty());

    let outcome = executor(desktop.clone(), dir.path(), Arc::new(PanicSwitch::new(true)))
        .execute(&plan)
        .await;
    assert_eq!(outcome.failed_step, Some(0));
    assert_eq!(outcome.error(), Some("DeskPilot is disabled (panic mode)"));
    assert_eq!(desktop.event_count(), 0);
}

#[tokio::test]
async fn unknown_app_is_rejected_at_execution() {
    let dir = tempfile::tempdir().unwrap();
    let desktop = Arc::new(DryRunDesktop::new());
    let plan = CommandInterpreter::new().unwrap().interpret("lance calculatrice");
    assert_eq!(
        plan[0],
        ActionStep::RunApp {
            name: "calculatrice".into()
        }
    );

    let outcome = executor(desktop.clone(), dir.path(), Arc::default())
        .execute(&plan)
        .await;
    assert_eq!(outcome.error(), Some("calculatrice not in allowlist"));
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(desktop.event_count(), 0);
}

use std::sync::Arc;
use std::time::Duration;

use action_primitives::{ActionEngine, ActionError, ActionExecutor};
use cdp_adapter::{DomEvent, EnvCall, MemoryElement, MemoryEnvironment, ScrollAlign};
use retrace_core_types::{ActionOptions, ActionPayload, ActionType};
use tokio::time::Instant;

fn engine() -> (Arc<MemoryEnvironment>, ActionEngine) {
    let env = Arc::new(MemoryEnvironment::new());
    let engine = ActionEngine::new(env.clone());
    (env, engine)
}

fn no_delay() -> ActionOptions {
    ActionOptions {
        delay_ms: 0,
        ..ActionOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn finish_short_circuits_without_locating() {
    let (env, engine) = engine();
    let started = Instant::now();

    let outcome = engine.execute(&ActionPayload::finish("done")).await.unwrap();
    assert_eq!(outcome, "Workflow Completed");

    let mut complete = ActionPayload::new(ActionType::ClickElement, "#never-there");
    complete.is_complete = true;
    let outcome = engine.execute(&complete).await.unwrap();
    assert_eq!(outcome, "Workflow Completed");

    assert_eq!(env.probe_count(), 0);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn missing_element_times_out_after_five_seconds() {
    let (_env, engine) = engine();
    let started = Instant::now();

    let err = engine
        .execute(&ActionPayload::new(ActionType::ClickElement, "#login-btn"))
        .await
        .unwrap_err();

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(5000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(5200), "{elapsed:?}");
    match err {
        ActionError::ElementNotFound(message) => {
            assert!(message.contains("#login-btn"));
            assert!(message.contains("5000"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn type_text_on_div_is_rejected_before_any_event() {
    let (env, engine) = engine();
    env.insert("#notes", MemoryElement::new("div"));

    let err = engine
        .execute(&ActionPayload::new(ActionType::TypeText, "#notes").with_value("hello"))
        .await
        .unwrap_err();

    assert!(matches!(err, ActionError::InvalidTarget(_)));
    assert!(env.dispatched().is_empty());
    assert!(env
        .calls()
        .iter()
        .all(|call| matches!(call, EnvCall::ScrollIntoView { .. })));
    assert_eq!(env.value_of("#notes").as_deref(), Some(""));
}

#[tokio::test(start_paused = true)]
async fn type_text_uses_native_setter_and_events() {
    let (env, engine) = engine();
    env.insert("#email", MemoryElement::new("input").with_value("old"));
    let started = Instant::now();

    let outcome = engine
        .execute(&ActionPayload::new(ActionType::TypeText, "#email").with_value("bob@example.com"))
        .await
        .unwrap();

    assert_eq!(outcome, "Executed TypeText on #email");
    assert_eq!(env.value_of("#email").as_deref(), Some("bob@example.com"));
    let calls = env.calls();
    assert_eq!(
        calls,
        vec![
            EnvCall::ScrollIntoView {
                selector: "#email".into(),
                align: ScrollAlign::Center
            },
            EnvCall::Focus("#email".into()),
            EnvCall::SelectContents("#email".into()),
            EnvCall::SetValue {
                selector: "#email".into(),
                value: "bob@example.com".into()
            },
            EnvCall::Dispatch {
                selector: "#email".into(),
                event: DomEvent::Input
            },
            EnvCall::Dispatch {
                selector: "#email".into(),
                event: DomEvent::Change
            },
            EnvCall::Dispatch {
                selector: "#email".into(),
                event: DomEvent::Blur
            },
        ]
    );
    // scroll settle + focus settle + default post delay
    assert_eq!(started.elapsed(), Duration::from_millis(300 + 50 + 500));
}

#[tokio::test(start_paused = true)]
async fn type_text_respects_clear_first_and_scroll_options() {
    let (env, engine) = engine();
    env.insert("textarea.bio", MemoryElement::new("textarea"));

    let options = ActionOptions {
        clear_first: false,
        scroll_into_view: false,
        ..no_delay()
    };
    engine
        .execute(
            &ActionPayload::new(ActionType::TypeText, "textarea.bio")
                .with_value("hi")
                .with_options(options),
        )
        .await
        .unwrap();

    let calls = env.calls();
    assert!(!calls
        .iter()
        .any(|call| matches!(call, EnvCall::SelectContents(_) | EnvCall::ScrollIntoView { .. })));
}

#[tokio::test(start_paused = true)]
async fn select_option_matches_label() {
    let (env, engine) = engine();
    env.insert(
        "#country",
        MemoryElement::new("select").with_options([
            ("us", "United States"),
            ("ca", "Canada"),
            ("mx", "Mexico"),
        ]),
    );

    let outcome = engine
        .execute(
            &ActionPayload::new(ActionType::SelectOption, "#country")
                .with_value("Canada")
                .with_options(no_delay()),
        )
        .await
        .unwrap();

    assert_eq!(outcome, "Executed SelectOption on #country");
    assert_eq!(env.selected_index("#country"), Some(1));
    assert_eq!(env.dispatched(), vec![DomEvent::Input, DomEvent::Change]);
}

#[tokio::test(start_paused = true)]
async fn select_option_prefers_first_match_in_index_order() {
    let (env, engine) = engine();
    env.insert(
        "#size",
        MemoryElement::new("select").with_options([("m", "Small"), ("Small", "Medium")]),
    );

    engine
        .execute(
            &ActionPayload::new(ActionType::SelectOption, "#size")
                .with_value("Small")
                .with_options(no_delay()),
        )
        .await
        .unwrap();
    assert_eq!(env.selected_index("#size"), Some(0));
}

#[tokio::test(start_paused = true)]
async fn select_option_without_match_fails() {
    let (env, engine) = engine();
    env.insert(
        "#country",
        MemoryElement::new("select").with_options([("us", "United States")]),
    );

    let err = engine
        .execute(&ActionPayload::new(ActionType::SelectOption, "#country").with_value("Canada"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::ElementNotFound(msg) if msg.contains("Canada")));
    assert!(env.dispatched().is_empty());
}

#[tokio::test(start_paused = true)]
async fn custom_dropdown_gets_one_click_and_no_delay() {
    let (env, engine) = engine();
    env.insert(".dropdown", MemoryElement::new("div"));
    let started = Instant::now();

    let outcome = engine
        .execute(&ActionPayload::new(ActionType::SelectOption, ".dropdown").with_value("Canada"))
        .await
        .unwrap();

    assert_eq!(outcome, "Clicked custom dropdown container");
    let activations = env
        .calls()
        .into_iter()
        .filter(|call| matches!(call, EnvCall::Activate(_)))
        .count();
    assert_eq!(activations, 1);
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn click_focuses_then_activates() {
    let (env, engine) = engine();
    env.insert("#go", MemoryElement::new("button"));

    let outcome = engine
        .execute(&ActionPayload::new(ActionType::ClickElement, "#go").with_options(no_delay()))
        .await
        .unwrap();

    assert_eq!(outcome, "Executed ClickElement on #go");
    let calls = env.calls();
    assert_eq!(
        &calls[1..],
        &[EnvCall::Focus("#go".into()), EnvCall::Activate("#go".into())]
    );
}

#[tokio::test(start_paused = true)]
async fn force_clicks_hidden_elements() {
    let (env, engine) = engine();
    env.insert("#hidden", MemoryElement::new("button").hidden());

    let forced = ActionOptions {
        force: true,
        ..no_delay()
    };
    engine
        .execute(&ActionPayload::new(ActionType::ClickElement, "#hidden").with_options(forced))
        .await
        .unwrap();
    assert!(env.calls().contains(&EnvCall::Activate("#hidden".into())));
}

#[tokio::test(start_paused = true)]
async fn wait_for_duration_and_default() {
    let (_env, engine) = engine();

    let started = Instant::now();
    let outcome = engine
        .execute(&ActionPayload::new(ActionType::WaitFor, "duration:750"))
        .await
        .unwrap();
    assert_eq!(outcome, "Waited for duration:750");
    assert_eq!(started.elapsed(), Duration::from_millis(750));

    let started = Instant::now();
    let outcome = engine
        .execute(&ActionPayload::new(ActionType::WaitFor, ""))
        .await
        .unwrap();
    assert_eq!(outcome, "Waited for duration");
    assert_eq!(started.elapsed(), Duration::from_millis(2000));
}

#[tokio::test(start_paused = true)]
async fn wait_for_element_polls_until_visible() {
    let (env, engine) = engine();
    env.insert_after("#results", MemoryElement::new("ul"), Duration::from_millis(900));

    let outcome = engine
        .execute(&ActionPayload::new(ActionType::WaitFor, "#results"))
        .await
        .unwrap();
    assert_eq!(outcome, "Waited for #results");
}

#[tokio::test(start_paused = true)]
async fn go_to_url_navigates_without_delay() {
    let (env, engine) = engine();
    let started = Instant::now();

    let outcome = engine
        .execute(&ActionPayload::new(ActionType::GoToUrl, "").with_value("https://shop.test/cart"))
        .await
        .unwrap();
    assert_eq!(outcome, "Navigated to https://shop.test/cart");
    assert_eq!(env.url(), "https://shop.test/cart");
    assert_eq!(started.elapsed(), Duration::ZERO);

    engine
        .execute(&ActionPayload::new(ActionType::GoToUrl, "").with_value("/checkout"))
        .await
        .unwrap();
    assert_eq!(env.url(), "https://shop.test/checkout");

    let err = engine
        .execute(&ActionPayload::new(ActionType::GoToUrl, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::InvalidTarget(_)));
}

#[tokio::test(start_paused = true)]
async fn scroll_to_element_or_pixels() {
    let (env, engine) = engine();
    env.insert("#footer", MemoryElement::new("footer"));

    engine
        .execute(&ActionPayload::new(ActionType::ScrollTo, "#footer").with_options(no_delay()))
        .await
        .unwrap();
    engine
        .execute(
            &ActionPayload::new(ActionType::ScrollTo, "#missing")
                .with_value("400")
                .with_options(no_delay()),
        )
        .await
        .unwrap();
    engine
        .execute(
            &ActionPayload::new(ActionType::ScrollTo, "")
                .with_value("250px")
                .with_options(no_delay()),
        )
        .await
        .unwrap();

    let calls = env.calls();
    assert_eq!(
        calls,
        vec![
            EnvCall::ScrollIntoView {
                selector: "#footer".into(),
                align: ScrollAlign::Start
            },
            EnvCall::ScrollBy(400.0),
            EnvCall::ScrollBy(250.0),
        ]
    );

    let err = engine
        .execute(
            &ActionPayload::new(ActionType::ScrollTo, "")
                .with_value("inf")
                .with_options(no_delay()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::InvalidTarget(_)));

    let err = engine
        .execute(&ActionPayload::new(ActionType::ScrollTo, "#missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::InvalidTarget(_)));
}

#[tokio::test(start_paused = true)]
async fn press_key_defaults_to_enter_and_hover_dispatches_mouseover() {
    let (env, engine) = engine();
    env.insert("#search", MemoryElement::new("input"));

    engine
        .execute(&ActionPayload::new(ActionType::PressKey, "#search").with_options(no_delay()))
        .await
        .unwrap();
    engine
        .execute(&ActionPayload::new(ActionType::HoverElement, "#search").with_options(no_delay()))
        .await
        .unwrap();

    assert_eq!(
        env.dispatched(),
        vec![
            DomEvent::KeyDown {
                key: "Enter".into()
            },
            DomEvent::MouseOver
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn unsupported_action_is_rejected() {
    let (env, engine) = engine();
    let payload = ActionPayload::new(ActionType::Unsupported("DragAndDrop".into()), "#card");

    let err = engine.execute(&payload).await.unwrap_err();
    assert!(matches!(err, ActionError::UnsupportedAction(msg) if msg.contains("DragAndDrop")));
    assert_eq!(env.probe_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn lost_environment_is_reported_as_unreachable() {
    let (env, engine) = engine();
    env.insert("#go", MemoryElement::new("button"));
    env.set_unreachable(true);

    let err = engine
        .execute(&ActionPayload::new(ActionType::ClickElement, "#go"))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionError::EnvironmentUnreachable(_)));
    assert!(!err.is_retryable());
}

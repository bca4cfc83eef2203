//! The page runtime run inside a real Chrome tab. Needs a local Chrome:
//! `cargo test --test chrome -- --ignored`.
#![cfg(feature = "chrome")]

use page_pilot::browser::{awaiting_navigation, ChromeGateway, NavigationOptions};
use page_pilot::core::gateway::PageSignal;
use page_pilot::selectors::ElementKind;
use page_pilot::{ActionOptions, Config, Gateway, PageSession, PilotError, Selector, TextPattern};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_test::assert_ok;

async fn page(html: &str) -> (Arc<ChromeGateway>, PageSession) {
    let config = Config::from_json_str(
        r#"{"retryInterval": 20, "retryTimeout": 2000, "waitForStart": 100, "navigationTimeout": 10000}"#,
    )
    .unwrap();
    let gateway = Arc::new(ChromeGateway::launch(&config).await.unwrap());
    gateway.navigate("about:blank").await.unwrap();
    let source = format!(
        "(document.body.innerHTML = {}, true)",
        serde_json::to_string(html).unwrap()
    );
    gateway.evaluate_expression(&source).await.unwrap();
    (gateway.clone(), PageSession::new(gateway, config))
}

async fn ids(session: &PageSession, selector: Selector) -> Vec<String> {
    let mut ids = Vec::new();
    for element in session.resolve(selector).run().await.unwrap() {
        ids.push(element.describe().await.unwrap().id.unwrap_or_default());
    }
    ids
}

async fn evaluate(gateway: &ChromeGateway, source: &str) -> serde_json::Value {
    gateway.evaluate_expression(source).await.unwrap().into_value().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn exact_labels_win_over_partial_ones() {
    let (_, session) =
        page(r#"<button id="a">Sign up</button><button id="b">Sign up for GitHub</button>"#).await;

    assert_eq!(ids(&session, Selector::button("Sign up")).await, vec!["a"]);
    assert_eq!(ids(&session, Selector::button("for GitHub")).await, vec!["b"]);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn labels_reach_their_fields() {
    let (_, session) = page(
        r#"<label for="x">Name</label><input id="x">
           <label>Email <input id="e"></label>
           <input type="checkbox" id="c"> Remember me"#,
    )
    .await;

    assert_eq!(ids(&session, Selector::text_box("Name")).await, vec!["x"]);
    assert_eq!(ids(&session, Selector::text_box("Email")).await, vec!["e"]);
    assert_eq!(ids(&session, Selector::check_box("Remember me")).await, vec!["c"]);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn text_matches_resolve_to_the_innermost_element() {
    let (_, session) = page(r#"<div id="outer"><p id="mid"><span id="inner">Total</span></p></div>"#).await;

    assert_eq!(ids(&session, Selector::text("Total")).await, vec!["inner"]);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn open_shadow_roots_are_searched() {
    let (gateway, session) = page(r#"<div id="host"></div>"#).await;
    evaluate(
        &gateway,
        "(document.getElementById('host').attachShadow({ mode: 'open' }).innerHTML = \
         '<button id=\"deep\">Inside</button>', true)",
    )
    .await;

    assert_eq!(ids(&session, Selector::button("Inside")).await, vec!["deep"]);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn patterns_run_the_same_inside_the_page() {
    let (_, session) =
        page(r#"<button id="a">Sign Up</button><button id="b">Step 12</button>"#).await;

    let sign_up = TextPattern::regex_ignore_case("^sign up$").unwrap();
    assert_eq!(ids(&session, Selector::button(sign_up)).await, vec!["a"]);

    let numbered = TextPattern::regex(r"Step \d+").unwrap();
    assert_eq!(ids(&session, Selector::button(numbered)).await, vec!["b"]);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn a_node_keeps_its_key_across_lookups() {
    let (_, session) = page(r#"<button id="a">Save</button>"#).await;

    let first = session.resolve(Selector::button("Save")).run().await.unwrap();
    let second = session.resolve(Selector::button("Save")).run().await.unwrap();
    assert_eq!(first[0].reference(), second[0].reference());
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn handles_from_a_replaced_document_are_stale() {
    let (gateway, session) = page(r#"<button id="a">Save</button>"#).await;
    let elements = session.resolve(Selector::button("Save")).run().await.unwrap();

    gateway.navigate("about:blank").await.unwrap();

    let error = elements[0].text().await.unwrap_err();
    assert!(matches!(error, PilotError::StaleContext(_)));
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn clicking_and_writing_through_real_input() {
    let (gateway, session) = page(
        r#"<div style="display: flex; gap: 10px">
             <span>Email</span><input id="old" disabled><input id="new">
           </div>
           <button onclick="window.clicks = (window.clicks || 0) + 1">Save</button>"#,
    )
    .await;

    let description = assert_ok!(session.click("Save", ActionOptions::default()).await);
    assert_eq!(description, "Clicked button with label Save 1 times");
    assert_eq!(evaluate(&gateway, "window.clicks").await, serde_json::json!(1));

    let field = Selector::any(ElementKind::TextBox).to_right_of(Selector::text("Email"));
    assert_ok!(session.write("hi", Some(field), ActionOptions::default()).await);
    assert_eq!(
        evaluate(&gateway, "document.getElementById('new').value").await,
        serde_json::json!("hi")
    );
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn a_tab_opened_by_a_click_is_reported_until_it_loads() {
    let (gateway, session) =
        page(r#"<a id="open" href="about:blank" target="_blank">Open</a>"#).await;
    let mut signals = gateway.subscribe().await.unwrap();

    let options = ActionOptions {
        wait_for_navigation: Some(false),
        ..ActionOptions::default()
    };
    assert_ok!(session.click(Selector::link("Open"), options).await);

    let mut created = None;
    let loaded = timeout(Duration::from_secs(5), async {
        while let Some(signal) = signals.recv().await {
            match signal {
                PageSignal::TargetCreated { target_id } => created = Some(target_id),
                PageSignal::TargetLoaded { target_id } if Some(&target_id) == created.as_ref() => {
                    return true
                }
                _ => {}
            }
        }
        false
    })
    .await;
    assert_eq!(loaded.ok(), Some(true));
    signals.close();
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs a local Chrome"]
async fn an_iframe_navigation_settles_without_a_page_load() {
    let (gateway, _) = page(r#"<iframe id="frame" src="about:blank"></iframe>"#).await;
    let options = NavigationOptions {
        navigation_timeout: Duration::from_secs(5),
        wait_for_start: Duration::from_millis(200),
        ..NavigationOptions::default()
    };

    let action = gateway.clone();
    let result = awaiting_navigation(gateway.as_ref(), &options, move || async move {
        action
            .evaluate_expression(
                "(document.getElementById('frame').src = 'data:text/html,<p>inner</p>', true)",
            )
            .await
            .map(|_| ())
    })
    .await;
    assert_ok!(result);
}

use page_pilot::core::gateway::MouseEventKind;
use page_pilot::selectors::ElementKind;
use page_pilot::testing::FakePage;
use page_pilot::{ActionOptions, Config, PageSession, PilotError, Point, Selector};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_test::{assert_err, assert_ok};

fn session(html: &str) -> (Arc<FakePage>, PageSession) {
    let page = Arc::new(FakePage::new(html));
    let config = Config::from_json_str(
        r#"{"retryInterval": 10, "retryTimeout": 200, "waitForStart": 30, "navigationTimeout": 2000}"#,
    )
    .unwrap();
    (page.clone(), PageSession::new(page, config))
}

async fn ids(session: &PageSession, selector: Selector) -> Vec<String> {
    let mut ids = Vec::new();
    for element in session.resolve(selector).run().await.unwrap() {
        ids.push(element.describe().await.unwrap().id.unwrap_or_default());
    }
    ids
}

#[tokio::test]
async fn clicking_a_visible_button_by_its_label() {
    let (page, session) = session(r#"<button id="save" data-rect="50,50,70,100">Save</button>"#);
    let mut events = session.events().subscribe();

    let description = assert_ok!(session.click("Save", ActionOptions::default()).await);
    assert_eq!(description, "Clicked button with label Save 1 times");

    let buttons: Vec<_> = page
        .mouse_events()
        .into_iter()
        .filter(|event| event.kind != MouseEventKind::Moved)
        .map(|event| (event.kind, event.point))
        .collect();
    assert_eq!(
        buttons,
        vec![
            (MouseEventKind::Pressed, Point::new(75.0, 60.0)),
            (MouseEventKind::Released, Point::new(75.0, 60.0)),
        ]
    );

    let event = events.recv().await.unwrap();
    assert_eq!(event.session_id, session.id());
    assert_eq!(event.description, description);
}

#[tokio::test]
async fn writing_skips_a_disabled_candidate() {
    let (page, session) = session(
        r#"<span data-rect="0,0,20,60">Email</span>
           <input id="old" disabled data-rect="0,70,20,170">
           <input id="new" data-rect="30,70,50,170">"#,
    );
    let field = Selector::any(ElementKind::TextBox).to_right_of(Selector::text("Email"));
    assert_eq!(ids(&session, field.clone()).await, vec!["old", "new"]);

    let description = assert_ok!(session.write("x", Some(field), ActionOptions::default()).await);
    assert_eq!(description, "Wrote x into the text field to right of element with label Email");
    assert_eq!(page.value_of("new").as_deref(), Some("x"));
    assert_eq!(page.value_of("old").as_deref(), Some(""));
}

#[tokio::test]
async fn proximity_selects_above_and_below() {
    let (_, session) = session(
        r#"<div id="a" data-rect="0,0,10,10">Alpha</div>
           <div id="b" data-rect="20,0,30,10">Beta</div>
           <hr id="r" data-rect="15,0,15,10">"#,
    );
    let reference = || Selector::with_attributes(ElementKind::Text, [("id", "r")]);
    let any = || Selector::any(ElementKind::Text);
    assert_eq!(ids(&session, any().above(reference())).await, vec!["a"]);
    assert_eq!(ids(&session, any().below(reference())).await, vec!["b"]);
}

#[tokio::test]
async fn clicks_wait_for_the_next_page_to_finish_loading() {
    let (page, session) = session(
        r#"<a id="next" href="/next" data-rect="0,0,20,80"
              data-navigates="http://localhost/next" data-ready-delay="200">Next page</a>"#,
    );
    let started = Instant::now();
    assert_ok!(session.click(Selector::link("Next page"), ActionOptions::default()).await);
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(page.url(), "http://localhost/next");
    assert_eq!(page.live_listeners(), 0);
}

#[tokio::test]
async fn slow_navigation_times_out_with_the_budget_in_the_message() {
    let (page, session) = session(
        r#"<button data-rect="0,0,20,80" data-navigates="http://localhost/slow"
                   data-ready-delay="1000">Slow</button>"#,
    );
    let err = assert_err!(
        session
            .click("Slow", ActionOptions::default().with_navigation_timeout(100))
            .await
    );
    assert_eq!(
        err.to_string(),
        "Navigation took more than 100ms. Please increase the navigationTimeout"
    );
    assert_eq!(page.live_listeners(), 0);
}

#[tokio::test]
async fn navigation_waits_can_be_turned_off() {
    let (page, session) = session(
        r#"<button data-rect="0,0,20,80" data-navigates="http://localhost/slow"
                   data-ready-delay="1000">Slow</button>"#,
    );
    let started = Instant::now();
    assert_ok!(
        session
            .click("Slow", ActionOptions::default().with_wait_for_navigation(false))
            .await
    );
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(page.subscriptions_opened(), 0);
}

#[tokio::test]
async fn pressing_enter_in_a_form_submits_it() {
    let (page, session) = session(
        r#"<form data-navigates="http://localhost/results" data-ready-delay="50">
             <label for="q">Search</label><input id="q" data-rect="0,0,20,200">
           </form>"#,
    );
    assert_ok!(
        session
            .write("rust\n", Some(Selector::text_box("Search")), ActionOptions::default())
            .await
    );
    assert_eq!(page.value_of("q").as_deref(), Some("rust"));
    assert_eq!(page.url(), "http://localhost/results");
}

#[tokio::test]
async fn a_dead_browser_fails_without_waiting_out_the_retry_budget() {
    let (page, session) = session(r#"<button data-rect="0,0,20,80">Save</button>"#);
    page.crash();
    let started = Instant::now();
    let err = assert_err!(
        session
            .click("Save", ActionOptions::default().with_retry(10, 5000))
            .await
    );
    assert!(err.is_fatal());
    assert!(matches!(err, PilotError::ProcessExited(_)));
    assert!(started.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn elements_that_appear_later_are_found_by_retrying() {
    let (page, session) = session("<p>loading</p>");
    let later = page.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        later.set_html(r#"<button id="late" data-rect="0,0,20,80">Continue</button>"#);
    });
    assert_ok!(session.click(Selector::button("Continue"), ActionOptions::default()).await);
    assert_eq!(page.clicked_ids(), vec!["late"]);
}

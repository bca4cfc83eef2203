use crate::actions::actionability::DEFAULT_CHECKS;
use crate::actions::base::ActionOptions;
use crate::browser::session::PageSession;
use crate::dom::remote::OptionQuery;
use crate::errors::{PilotError, Result};
use crate::selectors::spec::Selector;
use crate::selectors::text::compile_portable;
use std::path::Path;
use std::time::Instant;

impl OptionQuery {
    pub fn index(index: usize) -> Self {
        OptionQuery::Index { index }
    }

    /// Matches the visible text first and falls back to the value.
    pub fn text(text: impl Into<String>) -> Self {
        OptionQuery::Text { text: text.into() }
    }

    pub fn value(value: impl Into<String>) -> Self {
        OptionQuery::Value { value: value.into() }
    }

    /// Matches option text against a pattern in the dialect of
    /// [`compile_portable`].
    pub fn pattern(source: impl Into<String>, ignore_case: bool) -> Result<Self> {
        let source = source.into();
        compile_portable(&source, ignore_case)?;
        Ok(OptionQuery::Pattern {
            source,
            flags: if ignore_case { "i" } else { "" }.to_string(),
        })
    }
}

impl std::fmt::Display for OptionQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionQuery::Index { index } => write!(f, "option at index {}", index),
            OptionQuery::Text { text } => write!(f, "option {}", text),
            OptionQuery::Value { value } => write!(f, "option with value {}", value),
            OptionQuery::Pattern { source, flags } => write!(f, "option matching /{}/{}", source, flags),
        }
    }
}

impl PageSession {
    pub async fn select(
        &self,
        selector: impl Into<Selector>,
        option: OptionQuery,
        options: ActionOptions,
    ) -> Result<String> {
        let started = Instant::now();
        let selector = selector.into();
        selector.require(|c| c.has_options, "options")?;
        let element = self
            .find_actionable(&selector, DEFAULT_CHECKS, &options)
            .await?;
        self.highlight(&element).await;
        let chosen = self
            .navigating(&options, || element.select_option(option.clone()))
            .await?
            .ok_or_else(|| PilotError::NotFound {
                description: format!("{} of {}", option, element.description()),
            })?;
        self.completed(
            format!("Selected {} of the {}", chosen.text, element.description()),
            started,
        )
        .await
    }

    pub async fn check(&self, selector: impl Into<Selector>, options: ActionOptions) -> Result<String> {
        self.set_checked(selector.into(), true, options).await
    }

    pub async fn uncheck(&self, selector: impl Into<Selector>, options: ActionOptions) -> Result<String> {
        self.set_checked(selector.into(), false, options).await
    }

    async fn set_checked(&self, selector: Selector, checked: bool, options: ActionOptions) -> Result<String> {
        let started = Instant::now();
        selector.require(|c| c.has_checked_state, "checked state")?;
        let element = self
            .find_actionable(&selector, DEFAULT_CHECKS, &options)
            .await?;
        self.highlight(&element).await;
        self.navigating(&options, || element.set_checked(checked))
            .await?;
        let state = if checked { "checked" } else { "unchecked" };
        self.completed(format!("{} is {}", element.description(), state), started)
            .await
    }

    /// Sets the files of a file input. Hidden inputs are fine; styled
    /// uploaders usually hide the real one.
    pub async fn attach(
        &self,
        path: impl AsRef<Path>,
        to: impl Into<Selector>,
        options: ActionOptions,
    ) -> Result<String> {
        let started = Instant::now();
        let path = tokio::fs::canonicalize(path.as_ref()).await.map_err(|e| {
            PilotError::UnsupportedOperation(format!(
                "File {} does not exist: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let element = self.first_match(&to.into(), &options).await?;
        if !element.describe().await?.is_file_input() {
            return Err(PilotError::UnsupportedOperation(format!(
                "{} is not a file input",
                element.description()
            )));
        }
        let files = [path.clone()];
        self.navigating(&options, || {
            self.gateway().set_file_input_files(element.reference(), &files)
        })
        .await?;
        self.completed(
            format!("Attached {} to the {}", path.display(), element.description()),
            started,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::testing::FakePage;
    use std::io::Write;
    use std::sync::Arc;
    use tokio_test::assert_err;

    fn session(html: &str) -> (Arc<FakePage>, PageSession) {
        let page = Arc::new(FakePage::new(html));
        let config = Config::from_json_str(r#"{"retryTimeout": 50, "retryInterval": 10, "waitForStart": 10}"#)
            .unwrap();
        (page.clone(), PageSession::new(page, config))
    }

    const DROPDOWN: &str = r#"<label for="c">Country</label>
        <select id="c" data-rect="0,0,20,100">
          <option value="fr">France</option>
          <option value="de">Germany</option>
          <option value="jp">Japan</option>
        </select>"#;

    #[tokio::test]
    async fn selects_by_text_value_index_and_pattern() {
        let (page, session) = session(DROPDOWN);
        let dropdown = || Selector::drop_down("Country");

        let description = session
            .select(dropdown(), OptionQuery::text("germany"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(description, "Selected Germany of the dropdown with label Country");
        assert_eq!(page.value_of("c").as_deref(), Some("de"));

        session
            .select(dropdown(), OptionQuery::text("jp"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(page.value_of("c").as_deref(), Some("jp"));

        session
            .select(dropdown(), OptionQuery::index(0), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(page.value_of("c").as_deref(), Some("fr"));

        session
            .select(dropdown(), OptionQuery::value("de"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(page.value_of("c").as_deref(), Some("de"));

        session
            .select(dropdown(), OptionQuery::pattern("^jap", true).unwrap(), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(page.value_of("c").as_deref(), Some("jp"));
    }

    #[test]
    fn option_patterns_use_the_shared_dialect() {
        assert!(OptionQuery::pattern("^Jap(an)?$", false).is_ok());
        let err = assert_err!(OptionQuery::pattern("(?i)japan", false));
        assert!(matches!(err, PilotError::InvalidSelector(_)));
    }

    #[tokio::test]
    async fn missing_options_are_reported() {
        let (_, session) = session(DROPDOWN);
        let err = session
            .select(Selector::drop_down("Country"), OptionQuery::index(9), ActionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "option at index 9 of dropdown with label Country not found"
        );
    }

    #[tokio::test]
    async fn check_and_uncheck() {
        let (page, session) = session(
            r#"<input type="checkbox" id="t" data-rect="0,0,10,10"> Accept terms"#,
        );
        let description = session
            .check(Selector::check_box("Accept terms"), ActionOptions::default())
            .await
            .unwrap();
        assert_eq!(description, "checkbox with label Accept terms is checked");
        assert!(page.is_checked("t"));

        session
            .uncheck(Selector::check_box("Accept terms"), ActionOptions::default())
            .await
            .unwrap();
        assert!(!page.is_checked("t"));
    }

    #[tokio::test]
    async fn form_actions_refuse_kinds_without_the_state() {
        let (_, session) = session(r#"<button data-rect="0,0,10,10">Save</button>"#);
        let err = assert_err!(session.check(Selector::button("Save"), ActionOptions::default()).await);
        assert!(matches!(err, PilotError::UnsupportedOperation(_)));
        let err = assert_err!(
            session
                .select(Selector::link("Save"), OptionQuery::index(0), ActionOptions::default())
                .await
        );
        assert_eq!(err.to_string(), "Unsupported operation: link with label Save has no options");
    }

    #[tokio::test]
    async fn checking_a_radio_clears_its_group() {
        let (page, session) = session(
            r#"<label><input type="radio" name="size" id="s" checked data-rect="0,0,10,10">Small</label>
               <label><input type="radio" name="size" id="l" data-rect="20,0,30,10">Large</label>"#,
        );
        session
            .check(Selector::radio_button("Large"), ActionOptions::default())
            .await
            .unwrap();
        assert!(page.is_checked("l"));
        assert!(!page.is_checked("s"));
    }

    #[tokio::test]
    async fn attaches_existing_files_to_hidden_inputs() {
        let (page, session) = session(r#"<label for="u">Upload</label><input type="file" id="u">"#);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "report").unwrap();

        let description = session
            .attach(file.path(), Selector::file_field("Upload"), ActionOptions::default())
            .await
            .unwrap();
        let canonical = std::fs::canonicalize(file.path()).unwrap();
        assert!(description.starts_with("Attached "));
        assert!(description.ends_with(" to the file field with label Upload"));
        assert_eq!(page.files_of("u"), vec![canonical]);
    }

    #[tokio::test]
    async fn attach_rejects_missing_files_and_other_inputs() {
        let (_, session) = session(
            r#"<label for="u">Upload</label><input type="file" id="u">
               <label for="n">Name</label><input id="n">"#,
        );
        assert_err!(
            session
                .attach("/definitely/not/here.txt", Selector::file_field("Upload"), ActionOptions::default())
                .await
        );

        let file = tempfile::NamedTempFile::new().unwrap();
        let err = session
            .attach(file.path(), Selector::text_box("Name"), ActionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::UnsupportedOperation(_)));
    }
}

//! Button callback data.

/// A parsed button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    Confirm,
    Rewrite,
    Cancel,
    Project(String),
    ProjectPage(usize),
    TodoList(String),
    TodoListPage(usize),
    Person(String),
    NoPerson,
    PersonPage(usize),
    BatchProject(String),
    BatchProjectPage(usize),
    BatchTodoList(String),
    BatchTodoListPage(usize),
}

/// Splits `{prefix}_page_{n}` / `{prefix}_{id}`. Page actions are checked first
/// so an id can never be mistaken for a page number.
fn split<'a>(data: &'a str, prefix: &str) -> Option<Result<usize, &'a str>> {
    let rest = data.strip_prefix(prefix)?.strip_prefix('_')?;
    if let Some(page) = rest.strip_prefix("page_") {
        return page.parse::<usize>().ok().map(Ok);
    }
    if rest.is_empty() {
        return None;
    }
    Some(Err(rest))
}

impl WizardAction {
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        let data = data.trim();
        match data {
            "confirm_task" => return Some(Self::Confirm),
            "rewrite_task" => return Some(Self::Rewrite),
            "cancel_task" => return Some(Self::Cancel),
            "person_none" => return Some(Self::NoPerson),
            _ => {}
        }

        // batch_* first: "batch_project_1" must not parse as a plain project
        if let Some(parsed) = split(data, "batch_project") {
            return Some(match parsed {
                Ok(page) => Self::BatchProjectPage(page),
                Err(id) => Self::BatchProject(id.to_string()),
            });
        }
        if let Some(parsed) = split(data, "batch_todolist") {
            return Some(match parsed {
                Ok(page) => Self::BatchTodoListPage(page),
                Err(id) => Self::BatchTodoList(id.to_string()),
            });
        }
        if let Some(parsed) = split(data, "project") {
            return Some(match parsed {
                Ok(page) => Self::ProjectPage(page),
                Err(id) => Self::Project(id.to_string()),
            });
        }
        if let Some(parsed) = split(data, "todolist") {
            return Some(match parsed {
                Ok(page) => Self::TodoListPage(page),
                Err(id) => Self::TodoList(id.to_string()),
            });
        }
        if let Some(parsed) = split(data, "person") {
            return Some(match parsed {
                Ok(page) => Self::PersonPage(page),
                Err(id) => Self::Person(id.to_string()),
            });
        }
        None
    }

    #[must_use]
    pub fn is_page(&self) -> bool {
        matches!(
            self,
            Self::ProjectPage(_)
                | Self::TodoListPage(_)
                | Self::PersonPage(_)
                | Self::BatchProjectPage(_)
                | Self::BatchTodoListPage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fixed_actions() {
        assert_eq!(WizardAction::parse("confirm_task"), Some(WizardAction::Confirm));
        assert_eq!(WizardAction::parse("rewrite_task"), Some(WizardAction::Rewrite));
        assert_eq!(WizardAction::parse("cancel_task"), Some(WizardAction::Cancel));
        assert_eq!(WizardAction::parse("person_none"), Some(WizardAction::NoPerson));
    }

    #[test]
    fn parses_ids_and_pages() {
        assert_eq!(
            WizardAction::parse("project_123"),
            Some(WizardAction::Project("123".into()))
        );
        assert_eq!(
            WizardAction::parse("project_page_2"),
            Some(WizardAction::ProjectPage(2))
        );
        assert_eq!(
            WizardAction::parse("todolist_9"),
            Some(WizardAction::TodoList("9".into()))
        );
        assert_eq!(
            WizardAction::parse("person_page_0"),
            Some(WizardAction::PersonPage(0))
        );
        assert_eq!(
            WizardAction::parse("batch_project_5"),
            Some(WizardAction::BatchProject("5".into()))
        );
        assert_eq!(
            WizardAction::parse("batch_todolist_page_3"),
            Some(WizardAction::BatchTodoListPage(3))
        );
    }

    #[test]
    fn rejects_malformed_data() {
        assert_eq!(WizardAction::parse("project_"), None);
        assert_eq!(WizardAction::parse("project_page_x"), None);
        assert_eq!(WizardAction::parse("projects_1"), None);
        assert_eq!(WizardAction::parse("something_else"), None);
    }

    #[test]
    fn page_detection() {
        assert!(WizardAction::ProjectPage(1).is_page());
        assert!(!WizardAction::Project("1".into()).is_page());
    }
}

use tracing::debug;
use uuid::Uuid;

use crate::task::Task;

const MIN_PREFIX_LEN: usize = 4;

/// Resolves a user-typed task reference: a 1-based row number in display
/// order, or an unambiguous prefix of the task id.
pub fn resolve(tasks: &[Task], token: &str) -> Option<Uuid> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    if let Ok(position) = token.parse::<usize>() {
        let found = position
            .checked_sub(1)
            .and_then(|idx| tasks.get(idx))
            .map(|t| t.id);
        if found.is_some() || token.len() < MIN_PREFIX_LEN {
            return found;
        }
    }

    if token.len() < MIN_PREFIX_LEN {
        return None;
    }

    let needle = token.to_ascii_lowercase();
    let mut matches = tasks.iter().filter(|t| {
        t.id.hyphenated().to_string().starts_with(&needle)
            || t.id.simple().to_string().starts_with(&needle)
    });
    let first = matches.next()?;
    if matches.next().is_some() {
        debug!(token, "ambiguous task id prefix");
        None
    } else {
        Some(first.id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::resolve;
    use crate::task::Task;

    fn with_id(raw: &str) -> Task {
        let mut task = Task::new("t", Utc::now()).expect("task");
        task.id = Uuid::parse_str(raw).expect("uuid");
        task
    }

    #[test]
    fn positions_are_one_based() {
        let tasks = vec![
            with_id("aaaa1111-0000-4000-8000-000000000000"),
            with_id("bbbb2222-0000-4000-8000-000000000000"),
        ];
        assert_eq!(resolve(&tasks, "1"), Some(tasks[0].id));
        assert_eq!(resolve(&tasks, " 2 "), Some(tasks[1].id));
        assert_eq!(resolve(&tasks, "0"), None);
        assert_eq!(resolve(&tasks, "3"), None);
    }

    #[test]
    fn id_prefixes_must_be_unique() {
        let tasks = vec![
            with_id("abcd1111-0000-4000-8000-000000000000"),
            with_id("abcd2222-0000-4000-8000-000000000000"),
            with_id("12345678-0000-4000-8000-000000000000"),
        ];
        assert_eq!(resolve(&tasks, "ABCD1"), Some(tasks[0].id));
        assert_eq!(resolve(&tasks, "abcd"), None);
        assert_eq!(resolve(&tasks, "abc"), None);
        assert_eq!(resolve(&tasks, "1234"), Some(tasks[2].id));
        assert_eq!(resolve(&tasks, ""), None);
    }
}

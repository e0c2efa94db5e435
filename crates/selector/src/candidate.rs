use eduadmin_api::{Course, Project, QuestionBank, Student};

/// Label for a student without a recorded name.
pub const UNNAMED: &str = "Unnamed";

/// An entity that can be offered in a picker.
pub trait Candidate: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;

    fn display_name(&self) -> &str;

    /// Secondary text shown next to the name.
    fn detail(&self) -> Option<&str> {
        None
    }

    /// Identifier of the owning entity, for pickers that depend on another.
    fn parent_scope(&self) -> Option<&str> {
        None
    }
}

/// Case-insensitive name match. A blank keyword matches everything.
pub(crate) fn matches_keyword<E: Candidate>(entity: &E, keyword: &str) -> bool {
    let needle = keyword.trim().to_lowercase();
    needle.is_empty() || entity.display_name().to_lowercase().contains(&needle)
}

impl Candidate for Course {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn detail(&self) -> Option<&str> {
        self.instructor_name.as_deref()
    }
}

impl Candidate for Project {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn detail(&self) -> Option<&str> {
        self.level.as_deref()
    }
}

impl Candidate for QuestionBank {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    fn detail(&self) -> Option<&str> {
        self.course_name.as_deref()
    }

    fn parent_scope(&self) -> Option<&str> {
        self.course_id.as_deref()
    }
}

impl Candidate for Student {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            UNNAMED
        } else {
            &self.name
        }
    }

    fn detail(&self) -> Option<&str> {
        (!self.phone.is_empty()).then_some(self.phone.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_without_name_is_unnamed() {
        let student = Student {
            id: "s1".into(),
            name: " ".into(),
            phone: String::new(),
            email: None,
            status: None,
        };
        assert_eq!(student.display_name(), UNNAMED);
        assert_eq!(student.detail(), None);
    }

    #[test]
    fn question_bank_scope_is_its_course() {
        let bank = QuestionBank {
            id: "qb1".into(),
            name: "Mechanics".into(),
            course_id: Some("c1".into()),
            course_name: Some("Physics".into()),
            status: None,
        };
        assert_eq!(bank.parent_scope(), Some("c1"));
        assert_eq!(bank.detail(), Some("Physics"));
    }

    #[test]
    fn keyword_match_ignores_case_and_blank_keywords() {
        let bank = QuestionBank {
            id: "qb1".into(),
            name: "Wave Mechanics".into(),
            course_id: None,
            course_name: None,
            status: None,
        };
        assert!(matches_keyword(&bank, "mech"));
        assert!(matches_keyword(&bank, "  "));
        assert!(!matches_keyword(&bank, "optics"));
    }
}

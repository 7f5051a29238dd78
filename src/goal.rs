//! Goal entry for the opening screen.

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GoalInput {
  buffer: String,
}

impl GoalInput {
  pub fn text(&self) -> &str {
    &self.buffer
  }

  pub fn push(&mut self, c: char) {
    if !c.is_control() {
      self.buffer.push(c);
    }
  }

  pub fn backspace(&mut self) {
    self.buffer.pop();
  }

  pub fn can_submit(&self) -> bool {
    !self.buffer.trim().is_empty()
  }

  /// Returns the trimmed goal, or None while there is nothing but whitespace.
  pub fn submit(&self) -> Option<String> {
    let goal = self.buffer.trim();
    if goal.is_empty() { None } else { Some(goal.to_string()) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn typed(s: &str) -> GoalInput {
    let mut input = GoalInput::default();
    s.chars().for_each(|c| input.push(c));
    input
  }

  #[test]
  fn test_submit_trims() {
    assert_eq!(typed("  Finish Chapter 3 draft ").submit().as_deref(), Some("Finish Chapter 3 draft"));
  }

  #[test]
  fn test_blank_goal_rejected() {
    let input = typed("   ");
    assert!(!input.can_submit());
    assert_eq!(input.submit(), None);
  }

  #[test]
  fn test_backspace() {
    let mut input = typed("abc");
    input.backspace();
    assert_eq!(input.text(), "ab");
    input.backspace();
    input.backspace();
    input.backspace();
    assert_eq!(input.text(), "");
  }

  #[test]
  fn test_control_chars_ignored() {
    assert_eq!(typed("a\tb\u{7}").text(), "ab");
  }
}

//! Message templates, embedded at compile time and rendered with minijinja.
//!
//! Templates named `*.html` are auto-escaped; `*.txt` are not.

use minijinja::Environment;
use serde::Serialize;

use crate::Result;

/// The templates a rule can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
  AddressCreationConfirmation,
  ManagerTerminationAlert,
  ManagerVacantAlert,
  ItUserCreatedAlert,
}

impl TemplateId {
  pub const ALL: [Self; 4] = [
    Self::AddressCreationConfirmation,
    Self::ManagerTerminationAlert,
    Self::ManagerVacantAlert,
    Self::ItUserCreatedAlert,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::AddressCreationConfirmation => "address-creation-confirmation",
      Self::ManagerTerminationAlert => "manager-termination-alert",
      Self::ManagerVacantAlert => "manager-vacant-alert",
      Self::ItUserCreatedAlert => "ituser-created-alert",
    }
  }

  fn file_name(self) -> &'static str {
    match self {
      Self::AddressCreationConfirmation => "address-creation-confirmation.txt",
      Self::ManagerTerminationAlert => "manager-termination-alert.html",
      Self::ManagerVacantAlert => "manager-vacant-alert.html",
      Self::ItUserCreatedAlert => "ituser-created-alert.html",
    }
  }

  fn source(self) -> &'static str {
    match self {
      Self::AddressCreationConfirmation => {
        include_str!("../templates/address-creation-confirmation.txt")
      }
      Self::ManagerTerminationAlert => {
        include_str!("../templates/manager-termination-alert.html")
      }
      Self::ManagerVacantAlert => include_str!("../templates/manager-vacant-alert.html"),
      Self::ItUserCreatedAlert => include_str!("../templates/ituser-created-alert.html"),
    }
  }
}

/// The compiled template set.
pub struct Templates {
  env: Environment<'static>,
}

impl Templates {
  /// Compile every embedded template; fails on a syntax error.
  pub fn new() -> Result<Self> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(false);
    for id in TemplateId::ALL {
      env.add_template(id.file_name(), id.source())?;
    }
    Ok(Self { env })
  }

  pub fn render<S: Serialize>(&self, id: TemplateId, context: S) -> Result<String> {
    let template = self.env.get_template(id.file_name())?;
    Ok(template.render(context)?)
  }
}

#[cfg(test)]
mod tests {
  use minijinja::context;

  use super::*;

  #[test]
  fn every_template_compiles() {
    let templates = Templates::new().unwrap();
    for id in TemplateId::ALL {
      assert!(templates.env.get_template(id.file_name()).is_ok(), "{}", id.as_str());
    }
  }

  #[test]
  fn html_templates_escape_their_input() {
    let templates = Templates::new().unwrap();
    let body = templates
      .render(
        TemplateId::ManagerTerminationAlert,
        context! {
          name => "<b>Bob</b>",
          effective_date => "2024-01-01",
          location => "A / B",
          org_unit_user_key => "ab",
          upcoming => false,
        },
      )
      .unwrap();
    assert!(body.contains("&lt;b&gt;Bob"));
    assert!(!body.contains("<b>Bob"));
    // minijinja's html escaping covers `/` as well.
    assert!(body.contains("A &#x2f; B"));
    assert!(body.contains("2024-01-01"));
  }

  #[test]
  fn text_templates_do_not_escape() {
    let templates = Templates::new().unwrap();
    let body = templates
      .render(
        TemplateId::AddressCreationConfirmation,
        context! { name => "Ann & Co", units => "OS2MO." },
      )
      .unwrap();
    assert!(body.contains("Ann & Co"));
  }
}

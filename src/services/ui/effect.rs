use serenity::all::{CreateActionRow, CreateEmbed, CreateInputText, CreateModal, InputTextStyle};

/// Message sent to the interacting user only
#[derive(Debug, Clone)]
pub struct Reply {
    pub embed: CreateEmbed,
    pub ephemeral: bool,
}

impl Reply {
    pub fn ephemeral(embed: CreateEmbed) -> Self {
        Self {
            embed,
            ephemeral: true,
        }
    }

    pub fn public(embed: CreateEmbed) -> Self {
        Self {
            embed,
            ephemeral: false,
        }
    }
}

/// What the engine does after a view handled an event
#[derive(Debug, Clone)]
pub enum Effect {
    /// Re-render the session message in place
    Update,
    Reply(Reply),
    UpdateAndReply(Reply),
    /// Run the finalizer, render once more with disabled components and drop the session
    Close,
    Nothing,
}

#[derive(Debug, Clone)]
pub struct ModalField {
    pub id: String,
    pub label: String,
    pub placeholder: Option<String>,
    pub min_length: Option<u16>,
    pub max_length: Option<u16>,
    pub paragraph: bool,
}

impl ModalField {
    pub fn short(id: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            placeholder: None,
            min_length: None,
            max_length: None,
            paragraph: false,
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn length(mut self, min: u16, max: u16) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }
}

/// A one-shot dialog whose submission comes back to the same view
#[derive(Debug, Clone)]
pub struct ModalSpec {
    /// Action name delivered with the submission
    pub action: String,
    pub title: String,
    pub fields: Vec<ModalField>,
}

impl ModalSpec {
    pub fn new(action: &str, title: &str) -> Self {
        Self {
            action: action.to_string(),
            title: title.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: ModalField) -> Self {
        self.fields.push(field);
        self
    }

    pub(crate) fn build(&self, custom_id: String) -> CreateModal {
        let rows = self
            .fields
            .iter()
            .map(|f| {
                let style = if f.paragraph {
                    InputTextStyle::Paragraph
                } else {
                    InputTextStyle::Short
                };
                let mut input = CreateInputText::new(style, &f.label, &f.id).required(true);
                if let Some(placeholder) = &f.placeholder {
                    input = input.placeholder(placeholder);
                }
                if let Some(min) = f.min_length {
                    input = input.min_length(min);
                }
                if let Some(max) = f.max_length {
                    input = input.max_length(max);
                }
                CreateActionRow::InputText(input)
            })
            .collect();

        CreateModal::new(custom_id, &self.title).components(rows)
    }
}

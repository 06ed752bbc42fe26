//! Inline menu model: button actions and keyboard layouts.
//!
//! The Telegram adapter renders these keyboards and feeds callback data back
//! through [`MenuAction::parse`]; unknown data is ignored by the dispatcher.

use crate::{
    archive::ArchiveFormat,
    messaging::types::{InlineButton, InlineKeyboard},
};

/// Every button press the bot understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    ShowFormats,
    ListFiles,
    ClearFiles,
    ExtractArchives,
    ExtractAll,
    ListExtractable,
    Help,
    BackToMain,
    ChooseFormat(ArchiveFormat),
    ConfirmCompile(ArchiveFormat),
    Cancel,
}

impl MenuAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "menu:formats" => Some(MenuAction::ShowFormats),
            "menu:list" => Some(MenuAction::ListFiles),
            "menu:clear" => Some(MenuAction::ClearFiles),
            "menu:extract" => Some(MenuAction::ExtractArchives),
            "extract:all" => Some(MenuAction::ExtractAll),
            "extract:list" => Some(MenuAction::ListExtractable),
            "menu:help" => Some(MenuAction::Help),
            "menu:main" => Some(MenuAction::BackToMain),
            "cancel" => Some(MenuAction::Cancel),
            other => {
                if let Some(fmt) = other.strip_prefix("fmt:") {
                    return fmt.parse().ok().map(MenuAction::ChooseFormat);
                }
                if let Some(fmt) = other.strip_prefix("confirm:") {
                    return fmt.parse().ok().map(MenuAction::ConfirmCompile);
                }
                None
            }
        }
    }

    pub fn callback_data(&self) -> String {
        match self {
            MenuAction::ShowFormats => "menu:formats".to_string(),
            MenuAction::ListFiles => "menu:list".to_string(),
            MenuAction::ClearFiles => "menu:clear".to_string(),
            MenuAction::ExtractArchives => "menu:extract".to_string(),
            MenuAction::ExtractAll => "extract:all".to_string(),
            MenuAction::ListExtractable => "extract:list".to_string(),
            MenuAction::Help => "menu:help".to_string(),
            MenuAction::BackToMain => "menu:main".to_string(),
            MenuAction::ChooseFormat(fmt) => format!("fmt:{fmt}"),
            MenuAction::ConfirmCompile(fmt) => format!("confirm:{fmt}"),
            MenuAction::Cancel => "cancel".to_string(),
        }
    }
}

fn button(label: &str, action: MenuAction) -> InlineButton {
    InlineButton {
        label: label.to_string(),
        callback_data: action.callback_data(),
    }
}

/// The main menu shown after intake and most actions.
pub fn main_menu() -> InlineKeyboard {
    InlineKeyboard::one_per_row(vec![
        button("📦 Create Archive", MenuAction::ShowFormats),
        button("📋 List Files", MenuAction::ListFiles),
        button("🗑 Clear All", MenuAction::ClearFiles),
        button("🔧 Extract Archives", MenuAction::ExtractArchives),
        button("ℹ️ Help", MenuAction::Help),
    ])
}

/// Format picker: one row per supported format plus a back row.
pub fn format_menu() -> InlineKeyboard {
    let mut rows: Vec<Vec<InlineButton>> = ArchiveFormat::ALL
        .iter()
        .map(|fmt| {
            vec![button(
                &format!("📦 {} - {}", fmt.extension().to_uppercase(), fmt.label()),
                MenuAction::ChooseFormat(*fmt),
            )]
        })
        .collect();
    rows.push(vec![button("⬅️ Back", MenuAction::BackToMain)]);
    InlineKeyboard::new(rows)
}

/// Create/Cancel confirmation for the chosen format.
pub fn confirm_menu(format: ArchiveFormat) -> InlineKeyboard {
    InlineKeyboard::new(vec![vec![
        button("✅ Create", MenuAction::ConfirmCompile(format)),
        button("❌ Cancel", MenuAction::Cancel),
    ]])
}

/// Extraction submenu: extract everything, inspect first, or go back.
pub fn extract_menu() -> InlineKeyboard {
    InlineKeyboard::one_per_row(vec![
        button("📁 Extract All Archives", MenuAction::ExtractAll),
        button("📋 List Extractable Files", MenuAction::ListExtractable),
        button("⬅️ Back", MenuAction::BackToMain),
    ])
}

pub fn back_menu() -> InlineKeyboard {
    InlineKeyboard::one_per_row(vec![button("⬅️ Back to Main", MenuAction::BackToMain)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_data_round_trips() {
        let actions = [
            MenuAction::ShowFormats,
            MenuAction::ListFiles,
            MenuAction::ClearFiles,
            MenuAction::ExtractArchives,
            MenuAction::ExtractAll,
            MenuAction::ListExtractable,
            MenuAction::Help,
            MenuAction::BackToMain,
            MenuAction::ChooseFormat(ArchiveFormat::Zip),
            MenuAction::ChooseFormat(ArchiveFormat::SevenZ),
            MenuAction::ConfirmCompile(ArchiveFormat::Zip),
            MenuAction::ConfirmCompile(ArchiveFormat::SevenZ),
            MenuAction::Cancel,
        ];
        for action in actions {
            assert_eq!(MenuAction::parse(&action.callback_data()), Some(action));
        }
    }

    #[test]
    fn unknown_data_is_rejected() {
        assert_eq!(MenuAction::parse(""), None);
        assert_eq!(MenuAction::parse("menu:unknown"), None);
        assert_eq!(MenuAction::parse("fmt:rar"), None);
        assert_eq!(MenuAction::parse("confirm:tar"), None);
    }

    #[test]
    fn format_menu_offers_every_format() {
        let kb = format_menu();
        let data: Vec<String> = kb
            .rows
            .iter()
            .flatten()
            .map(|b| b.callback_data.clone())
            .collect();
        assert!(data.contains(&"fmt:zip".to_string()));
        assert!(data.contains(&"fmt:7z".to_string()));
        assert!(data.contains(&"menu:main".to_string()));
    }

    #[test]
    fn extract_menu_offers_all_list_and_back() {
        let kb = extract_menu();
        let data: Vec<String> = kb
            .rows
            .iter()
            .flatten()
            .map(|b| b.callback_data.clone())
            .collect();
        assert_eq!(data, vec!["extract:all", "extract:list", "menu:main"]);
    }

    #[test]
    fn confirm_menu_keeps_create_and_cancel_on_one_row() {
        let kb = confirm_menu(ArchiveFormat::SevenZ);
        assert_eq!(kb.rows.len(), 1);
        assert_eq!(kb.rows[0].len(), 2);
        assert_eq!(kb.rows[0][0].callback_data, "confirm:7z");
        assert_eq!(kb.rows[0][1].callback_data, "cancel");
    }
}

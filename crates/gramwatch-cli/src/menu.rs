use crate::ops;
use crate::progress::CliReporter;
use colored::*;
use gramwatch_core::coordinator::ScanMode;
use gramwatch_core::settings::SETTING_KEYS;
use gramwatch_core::{AccountRegistry, CookieStore, SettingsStore};
use std::io::{self, BufRead, Write};
use std::path::Path;

/// Interactive states. Every operation state returns to `MainMenu` when it
/// finishes; only `Exit` leaves the loop. Transition parsing is separated
/// from terminal IO so it can be tested directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    MainMenu,
    Scanning { download: bool },
    ManualDownload,
    EditingCredentials,
    EditingAccounts,
    EditingSettings,
    Exit,
}

/// Main menu input → next state. None = unrecognized input, stay put.
pub fn main_transition(input: &str) -> Option<MenuState> {
    match input.trim().to_uppercase().as_str() {
        "1" => Some(MenuState::Scanning { download: false }),
        "2" => Some(MenuState::Scanning { download: true }),
        "3" => Some(MenuState::ManualDownload),
        "4" => Some(MenuState::EditingCredentials),
        "5" => Some(MenuState::EditingAccounts),
        "6" => Some(MenuState::EditingSettings),
        "Q" => Some(MenuState::Exit),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountsChoice {
    Add,
    Remove,
    Back,
}

pub fn accounts_transition(input: &str) -> Option<AccountsChoice> {
    match input.trim().to_uppercase().as_str() {
        "1" => Some(AccountsChoice::Add),
        "2" => Some(AccountsChoice::Remove),
        "B" | "M" => Some(AccountsChoice::Back),
        _ => None,
    }
}

/// Settings menu input: a 1-based key index, or back.
pub fn setting_key_for(input: &str) -> Option<&'static str> {
    let n: usize = input.trim().parse().ok()?;
    SETTING_KEYS.get(n.checked_sub(1)?).copied()
}

const MAIN_MENU: &str = "\
  1. Scan only          - record new item ids, download nothing
  2. Scan and download  - fetch new items and their metadata
  3. Manual download    - fetch a single URL
  4. Update credentials - replace the cookie file
  5. Manage accounts    - add or remove monitored accounts
  6. Settings           - paths, limits, throttle
  Q. Quit";

fn read_line(prompt: &str) -> io::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_confirm(prompt: &str) -> io::Result<bool> {
    loop {
        let input = read_line(&format!("{} (y/N): ", prompt))?;
        match input.to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" | "" => return Ok(false),
            _ => continue,
        }
    }
}

pub struct Menu {
    settings: SettingsStore,
}

impl Menu {
    pub fn new(settings: SettingsStore) -> Self {
        Menu { settings }
    }

    pub fn run(&mut self) -> io::Result<()> {
        let mut state = MenuState::MainMenu;
        loop {
            state = match state {
                MenuState::MainMenu => self.main_menu()?,
                MenuState::Scanning { download } => {
                    self.scan(download);
                    MenuState::MainMenu
                }
                MenuState::ManualDownload => {
                    self.manual_download()?;
                    MenuState::MainMenu
                }
                MenuState::EditingCredentials => {
                    self.edit_credentials()?;
                    MenuState::MainMenu
                }
                MenuState::EditingAccounts => {
                    self.edit_accounts()?;
                    MenuState::MainMenu
                }
                MenuState::EditingSettings => {
                    self.edit_settings()?;
                    MenuState::MainMenu
                }
                MenuState::Exit => {
                    println!("Bye.");
                    return Ok(());
                }
            };
        }
    }

    fn main_menu(&self) -> io::Result<MenuState> {
        println!();
        println!("{}", "gramwatch".bold().cyan());
        println!("{}", MAIN_MENU);

        loop {
            let input = read_line("> ")?;
            match main_transition(&input) {
                Some(next) => return Ok(next),
                None => println!("  Enter 1-6 or Q."),
            }
        }
    }

    fn scan(&self, download: bool) {
        let mode = if download {
            ScanMode::Download
        } else {
            ScanMode::ArchiveOnly
        };
        let reporter = CliReporter::new();
        match ops::run_scan(self.settings.settings(), mode, None, &reporter) {
            Ok(Some(summary)) => ops::print_summary(&summary, mode),
            Ok(None) => {}
            Err(e) => println!("{} {}", "Scan aborted:".red(), e),
        }
    }

    fn manual_download(&self) -> io::Result<()> {
        let url = read_line("URL (empty to cancel): ")?;
        if url.is_empty() {
            return Ok(());
        }
        match ops::manual_download(self.settings.settings(), &url) {
            Ok(files) => {
                println!("{} {} files", "Downloaded".green(), files.len());
                for file in files.iter().take(10) {
                    println!("  {}", file.display());
                }
                if files.len() > 10 {
                    println!("  ... and {} more", files.len() - 10);
                }
            }
            Err(e) => println!("{} {}", "Download failed:".red(), e),
        }
        Ok(())
    }

    fn edit_credentials(&self) -> io::Result<()> {
        let store = CookieStore::new(self.settings.settings().cookies_path());
        println!();
        println!(
            "Credentials file: {} ({})",
            store.path().display(),
            if store.is_present() {
                "present".green()
            } else {
                "missing".red()
            }
        );
        println!("Paste the cookie text, or enter @/path/to/file to copy a file.");
        let input = read_line("> ")?;
        if input.is_empty() {
            return Ok(());
        }

        let result = match input.strip_prefix('@') {
            Some(path) => store.update_from_file(Path::new(path.trim())),
            None => store.update_from_text(&input),
        };
        match result {
            Ok(()) => println!("{}", "Credentials updated.".green()),
            Err(e) => println!("{} {}", "Update failed:".red(), e),
        }
        Ok(())
    }

    fn edit_accounts(&self) -> io::Result<()> {
        loop {
            let mut registry =
                match AccountRegistry::load(self.settings.settings().accounts_path()) {
                    Ok(reg) => reg,
                    Err(e) => {
                        println!("{} {}", "Cannot load account registry:".red(), e);
                        return Ok(());
                    }
                };

            println!();
            println!("{} ({} accounts)", "Monitored accounts".bold(), registry.len());
            for (i, account) in registry.list().iter().enumerate() {
                println!(
                    "  {}. {} {}",
                    i + 1,
                    account.username,
                    format!("(added {})", account.added_at.format("%Y-%m-%d")).dimmed()
                );
            }
            println!("  1. Add   2. Remove   B. Back");

            let input = read_line("> ")?;
            match accounts_transition(&input) {
                Some(AccountsChoice::Add) => {
                    let username = read_line("Username to add: ")?;
                    if username.is_empty() {
                        continue;
                    }
                    match registry.add(&username) {
                        Ok(account) => {
                            println!("{} {}", "Added".green(), account.username)
                        }
                        Err(e) => println!("{} {}", "Not added:".red(), e),
                    }
                }
                Some(AccountsChoice::Remove) => {
                    let username = read_line("Username to remove: ")?;
                    if username.is_empty() {
                        continue;
                    }
                    if !prompt_confirm(&format!("Remove '{}'?", username))? {
                        continue;
                    }
                    match registry.remove(&username) {
                        Ok(account) => {
                            println!("{} {}", "Removed".green(), account.username)
                        }
                        Err(e) => println!("{} {}", "Not removed:".red(), e),
                    }
                }
                Some(AccountsChoice::Back) => return Ok(()),
                None => println!("  Enter 1, 2 or B."),
            }
        }
    }

    fn edit_settings(&mut self) -> io::Result<()> {
        loop {
            println!();
            println!("{}", "Settings".bold());
            for (i, key) in SETTING_KEYS.iter().enumerate() {
                let value = self.settings.get(key).unwrap_or_default();
                let display = if value.is_empty() {
                    "(unset)".dimmed().to_string()
                } else {
                    value
                };
                println!("  {:>2}. {:<22} {}", i + 1, key, display);
            }
            println!("   B. Back");

            let input = read_line("> ")?;
            if input.eq_ignore_ascii_case("b") {
                return Ok(());
            }
            let Some(key) = setting_key_for(&input) else {
                println!("  Enter a setting number or B.");
                continue;
            };

            let value = read_line(&format!("New value for {}: ", key))?;
            match self.settings.set(key, &value) {
                Ok(()) => println!("{} {} = {}", "Saved".green(), key, value),
                Err(e) => println!("{} {}", "Rejected:".red(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_main_transition_covers_all_operations() {
        assert_eq!(
            main_transition("1"),
            Some(MenuState::Scanning { download: false })
        );
        assert_eq!(
            main_transition("2"),
            Some(MenuState::Scanning { download: true })
        );
        assert_eq!(main_transition("3"), Some(MenuState::ManualDownload));
        assert_eq!(main_transition("4"), Some(MenuState::EditingCredentials));
        assert_eq!(main_transition("5"), Some(MenuState::EditingAccounts));
        assert_eq!(main_transition("6"), Some(MenuState::EditingSettings));
        assert_eq!(main_transition("q"), Some(MenuState::Exit));
        assert_eq!(main_transition(" Q "), Some(MenuState::Exit));
        assert_eq!(main_transition("7"), None);
        assert_eq!(main_transition(""), None);
    }

    #[test]
    fn test_accounts_transition() {
        assert_eq!(accounts_transition("1"), Some(AccountsChoice::Add));
        assert_eq!(accounts_transition("2"), Some(AccountsChoice::Remove));
        assert_eq!(accounts_transition("b"), Some(AccountsChoice::Back));
        assert_eq!(accounts_transition("m"), Some(AccountsChoice::Back));
        assert_eq!(accounts_transition("x"), None);
    }

    #[test]
    fn test_menu_text_is_plain_ascii() {
        assert!(MAIN_MENU.is_ascii());
    }

    #[test]
    fn test_setting_key_for_maps_one_based_index() {
        assert_eq!(setting_key_for("1"), Some("data_dir"));
        assert_eq!(
            setting_key_for(&SETTING_KEYS.len().to_string()),
            Some(*SETTING_KEYS.last().unwrap())
        );
        assert_eq!(setting_key_for("0"), None);
        assert_eq!(setting_key_for("99"), None);
        assert_eq!(setting_key_for("b"), None);
    }
}

use std::path::PathBuf;

use nix::unistd::{geteuid, User};

use crate::model::Privilege;
use crate::util::Owner;

#[derive(Debug, Clone)]
pub struct UserInfo {
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

impl UserInfo {
    pub fn owner(&self) -> Owner {
        Owner {
            uid: self.uid,
            gid: self.gid,
        }
    }
}

/// Look up a user in the passwd database.
pub fn lookup(username: &str) -> Option<UserInfo> {
    match User::from_name(username) {
        Ok(Some(user)) => Some(UserInfo {
            uid: user.uid.as_raw(),
            gid: user.gid.as_raw(),
            home: user.dir,
        }),
        Ok(None) => None,
        Err(e) => {
            log::warn!("Failed to look up user {}: {}", username, e);
            None
        }
    }
}

/// Name of the effective user running this process.
pub fn current_username() -> Option<String> {
    User::from_uid(geteuid()).ok().flatten().map(|u| u.name)
}

/// Running as root on behalf of another user through `sudo`.
pub fn elevated_by_sudo() -> bool {
    geteuid().is_root() && std::env::var_os("SUDO_USER").is_some_and(|u| !u.is_empty())
}

/// OS user that a command with the given privilege must run as.
pub fn target_user<'a>(privilege: Privilege, interactive_user: &'a str) -> &'a str {
    match privilege {
        Privilege::Root => "root",
        Privilege::User => interactive_user,
    }
}

/// Wrap `argv` so it runs as `target`, given that we currently run as
/// `current`. Same user runs directly, root goes through plain `sudo`,
/// anyone else through `sudo -u`.
pub fn run_as_argv(target: &str, current: &str, argv: &[String]) -> Vec<String> {
    let mut wrapped = Vec::with_capacity(argv.len() + 3);
    if target != current {
        wrapped.push("sudo".to_string());
        if target != "root" {
            wrapped.push("-u".to_string());
            wrapped.push(target.to_string());
        }
    }
    wrapped.extend(argv.iter().cloned());
    wrapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test_case("pi", "pi", &["killall", "kodi.bin"] ; "same user runs directly")]
    #[test_case("root", "pi", &["sudo", "killall", "kodi.bin"] ; "root from user uses sudo")]
    #[test_case("pi", "root", &["sudo", "-u", "pi", "killall", "kodi.bin"] ; "user from root uses sudo -u")]
    #[test_case("root", "root", &["killall", "kodi.bin"] ; "root as root runs directly")]
    fn wraps_for_target_user(target: &str, current: &str, expected: &[&str]) {
        let wrapped = run_as_argv(target, current, &argv(&["killall", "kodi.bin"]));
        assert_eq!(wrapped, argv(expected));
    }

    #[test]
    fn desktop_privilege_targets_root() {
        assert_eq!(target_user(Privilege::Root, "pi"), "root");
        assert_eq!(target_user(Privilege::User, "pi"), "pi");
    }

    #[test]
    fn root_is_always_known() {
        let root = lookup("root").expect("root user");
        assert_eq!(root.uid, 0);
    }
}

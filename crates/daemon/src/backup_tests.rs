// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mcmdd_core::Config;

#[yare::parameterized(
    default_template = { "tar cf %s.tar %s", &["backups/alpha/x", "alpha"], "tar cf backups/alpha/x.tar alpha" },
    no_placeholders  = { "echo done", &[], "echo done" },
    extra_args       = { "cp %s /mnt", &["a", "b"], "cp a /mnt" },
    missing_args     = { "%s %s %s", &["only"], "only %s %s" },
    adjacent         = { "%s%s", &["a", "b"], "ab" },
)]
fn expands(template: &str, args: &[&str], expected: &str) {
    assert_eq!(expand_template(template, args), expected);
}

fn registry(conf: &str) -> (Registry, Config) {
    let config = Config::parse(conf).expect("parse failed");
    (Registry::from_config(&config), config)
}

#[test]
fn disabled_frequency_is_never_due() {
    let (registry, config) = registry("servers = alpha\n");
    assert!(due_sessions(&registry, &config, 0).is_empty());
    assert!(due_sessions(&registry, &config, 12345).is_empty());
}

#[test]
fn due_on_matching_minutes_only() {
    let (registry, config) = registry("servers = alpha\n[alpha]\nbackup_frequency = 30\n");
    assert_eq!(due_sessions(&registry, &config, 60).len(), 1);
    assert_eq!(due_sessions(&registry, &config, 90).len(), 1);
    assert!(due_sessions(&registry, &config, 61).is_empty());
    assert!(due_sessions(&registry, &config, 89).is_empty());
}

#[test]
fn each_child_has_its_own_frequency() {
    let (registry, config) = registry(
        "servers = alpha beta\n\
         [alpha]\n\
         backup_frequency = 2\n\
         [beta]\n\
         backup_frequency = 3\n",
    );
    let ids = |tmin| {
        due_sessions(&registry, &config, tmin)
            .iter()
            .map(|s| s.id().to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(6), vec!["alpha", "beta"]);
    assert_eq!(ids(4), vec!["alpha"]);
    assert_eq!(ids(9), vec!["beta"]);
    assert!(ids(5).is_empty());
}

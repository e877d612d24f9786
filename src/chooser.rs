// Copyright 2024 ZSoftly Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The narrow seam through which a caller picks one account/role pair out
//! of several visible ones, mirroring the dependency-inversion the teacher
//! draws around `AuthType`: the broker only ever depends on this trait, not
//! on any particular interactive selector implementation.

use crate::error::{Error, ErrorKind, Result};
use crate::identity::protocol::{AccountWithRoles, Role};

/// Picks exactly one `(account, role)` pair out of the accounts/roles
/// visible to an identity. Implementations range from fully interactive
/// (a terminal list picker) to fully deterministic (tests, single-account
/// identities).
pub trait Chooser {
    fn choose<'a>(
        &self,
        accounts: &'a [AccountWithRoles],
    ) -> Result<(&'a crate::identity::protocol::Account, &'a Role)>;
}

/// Picks the first account and its first role. Correct whenever there is
/// exactly one visible account with exactly one role — the common case for
/// a single-account organization — and otherwise a deliberately simplistic
/// default a caller should replace with an interactive chooser.
pub struct FirstChooser;

impl Chooser for FirstChooser {
    fn choose<'a>(
        &self,
        accounts: &'a [AccountWithRoles],
    ) -> Result<(&'a crate::identity::protocol::Account, &'a Role)> {
        let first = accounts
            .first()
            .ok_or_else(|| Error::new(ErrorKind::Auth, "no accounts available to choose from"))?;
        let role = first
            .roles
            .first()
            .ok_or_else(|| Error::new(ErrorKind::Auth, "account has no assignable roles"))?;
        Ok((&first.account, role))
    }
}

/// Picks a specific `(account_id, role_name)` pair, failing loudly if it
/// isn't present. Grounded in non-interactive usage: CI, scripted logins, or
/// a profile that has already recorded which account/role it wants.
pub struct FixedChooser {
    pub account_id: String,
    pub role_name: String,
}

impl Chooser for FixedChooser {
    fn choose<'a>(
        &self,
        accounts: &'a [AccountWithRoles],
    ) -> Result<(&'a crate::identity::protocol::Account, &'a Role)> {
        for entry in accounts {
            if entry.account.account_id == self.account_id {
                if let Some(role) = entry.roles.iter().find(|r| r.role_name == self.role_name) {
                    return Ok((&entry.account, role));
                }
            }
        }
        Err(Error::new(
            ErrorKind::ResourceNotFound,
            format!(
                "account {} with role {} is not visible to this identity",
                self.account_id, self.role_name
            ),
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::identity::protocol::Account;

    fn sample() -> Vec<AccountWithRoles> {
        vec![
            AccountWithRoles {
                account: Account {
                    account_id: "111111111111".to_string(),
                    account_name: Some("Acme Dev".to_string()),
                    email_address: None,
                },
                roles: vec![Role {
                    account_id: "111111111111".to_string(),
                    role_name: "Developer".to_string(),
                }],
            },
            AccountWithRoles {
                account: Account {
                    account_id: "222222222222".to_string(),
                    account_name: Some("Acme Prod".to_string()),
                    email_address: None,
                },
                roles: vec![
                    Role {
                        account_id: "222222222222".to_string(),
                        role_name: "Viewer".to_string(),
                    },
                    Role {
                        account_id: "222222222222".to_string(),
                        role_name: "Admin".to_string(),
                    },
                ],
            },
        ]
    }

    #[test]
    fn first_chooser_takes_first_of_each() {
        let accounts = sample();
        let (account, role) = FirstChooser.choose(&accounts).unwrap();
        assert_eq!(account.account_id, "111111111111");
        assert_eq!(role.role_name, "Developer");
    }

    #[test]
    fn fixed_chooser_finds_exact_match() {
        let accounts = sample();
        let chooser = FixedChooser {
            account_id: "222222222222".to_string(),
            role_name: "Admin".to_string(),
        };
        let (account, role) = chooser.choose(&accounts).unwrap();
        assert_eq!(account.account_id, "222222222222");
        assert_eq!(role.role_name, "Admin");
    }

    #[test]
    fn fixed_chooser_errors_on_missing_role() {
        let accounts = sample();
        let chooser = FixedChooser {
            account_id: "111111111111".to_string(),
            role_name: "Admin".to_string(),
        };
        assert!(chooser.choose(&accounts).is_err());
    }

    #[test]
    fn empty_accounts_is_an_error() {
        assert!(FirstChooser.choose(&[]).is_err());
    }
}

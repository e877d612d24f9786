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

//! Wire-shaped types returned by the Identity Broker's account/role
//! discovery, independent of the `aws-sdk-sso` response shapes so the rest
//! of the crate never names an SDK type directly (the same seam the
//! teacher draws between `identity::internal` and the public `identity`
//! surface).

use std::fmt;

/// One SSO-visible account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub account_id: String,
    pub account_name: Option<String>,
    pub email_address: Option<String>,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.account_name {
            Some(name) => write!(f, "{} ({})", name, self.account_id),
            None => write!(f, "{}", self.account_id),
        }
    }
}

/// One role assignable within an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub account_id: String,
    pub role_name: String,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.role_name)
    }
}

/// An account paired with every role the caller may assume within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountWithRoles {
    pub account: Account,
    pub roles: Vec<Role>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_prefers_name_over_id() {
        let with_name = Account {
            account_id: "111111111111".to_string(),
            account_name: Some("Acme Prod".to_string()),
            email_address: None,
        };
        assert_eq!(with_name.to_string(), "Acme Prod (111111111111)");

        let without_name = Account {
            account_id: "222222222222".to_string(),
            account_name: None,
            email_address: None,
        };
        assert_eq!(without_name.to_string(), "222222222222");
    }
}

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

//! Resolves an instance by name or ID from the first CLI argument and runs
//! the remaining arguments as a shell command on it.

use ztictl::clients::Clients;
use ztictl::exec::execute;
use ztictl::instance;

#[tokio::main]
async fn main() -> ztictl::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let target = args.next().expect("usage: run-command <instance-name-or-id> <command...>");
    let command: Vec<String> = args.collect();
    if command.is_empty() {
        panic!("usage: run-command <instance-name-or-id> <command...>");
    }

    let clients = Clients::discover(None).await;
    let resolved = instance::resolve(&clients.ec2, &target).await?;
    println!("running on {} ({})", resolved.instance_id, resolved.name.as_deref().unwrap_or("unnamed"));

    let result = execute(&clients.ssm, &resolved.instance_id, None, command).await?;
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    std::process::exit(result.exit_code);
}

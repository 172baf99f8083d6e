use std::path::PathBuf;

use serde::Deserialize;
use serde_json::json;

use crate::pool::member::{InstanceId, InstanceState, Member};
use crate::pool::provider::common::{get_binary, run_command, run_json_command};
use crate::pool::provider::{CloudProvider, InstanceRequest, ProviderFuture, ProviderResult};

/// Talks to Amazon EC2 through the `aws` command line tool.
pub struct Ec2Handler {
    aws_path: PathBuf,
    region: String,
}

impl Ec2Handler {
    pub fn new(region: String) -> anyhow::Result<Self> {
        let aws_path = get_binary("aws")?;
        Ok(Self { aws_path, region })
    }

    fn base_args(&self, operation: &str) -> Vec<String> {
        vec![
            "ec2".to_string(),
            operation.to_string(),
            "--region".to_string(),
            self.region.clone(),
            "--output".to_string(),
            "json".to_string(),
        ]
    }
}

impl CloudProvider for Ec2Handler {
    fn list_instances(&self) -> ProviderFuture<Vec<Member>> {
        let aws_path = self.aws_path.clone();
        let args = self.base_args("describe-instances");

        Box::pin(async move {
            let output = run_command(&aws_path, &args).await?;
            parse_describe_instances(&output)
        })
    }

    fn run_instances(&self, request: &InstanceRequest) -> ProviderFuture<Vec<InstanceId>> {
        let aws_path = self.aws_path.clone();
        let mut args = self.base_args("run-instances");
        args.extend(build_run_instances_args(request));

        Box::pin(async move {
            let output: RunInstancesOutput = run_json_command(&aws_path, &args).await?;
            Ok(output
                .instances
                .into_iter()
                .map(|instance| instance.instance_id)
                .collect())
        })
    }

    fn stop_instances(&self, ids: &[InstanceId]) -> ProviderFuture<()> {
        let aws_path = self.aws_path.clone();
        let mut args = self.base_args("stop-instances");
        args.extend(build_instance_ids_args(ids));

        Box::pin(async move {
            run_command(&aws_path, &args).await?;
            Ok(())
        })
    }

    fn terminate_instances(&self, ids: &[InstanceId]) -> ProviderFuture<()> {
        let aws_path = self.aws_path.clone();
        let mut args = self.base_args("terminate-instances");
        args.extend(build_instance_ids_args(ids));

        Box::pin(async move {
            run_command(&aws_path, &args).await?;
            Ok(())
        })
    }
}

fn build_run_instances_args(request: &InstanceRequest) -> Vec<String> {
    let mut args = vec![
        "--image-id".to_string(),
        request.image_id.clone(),
        "--instance-type".to_string(),
        request.instance_type.clone(),
        "--count".to_string(),
        format!("{count}:{count}", count = request.count),
        "--key-name".to_string(),
        request.key_name.clone(),
    ];
    if !request.security_groups.is_empty() {
        args.push("--security-groups".to_string());
        args.extend(request.security_groups.iter().cloned());
    }
    if !request.tags.is_empty() {
        let tags: Vec<_> = request
            .tags
            .iter()
            .map(|(key, value)| json!({"Key": key, "Value": value}))
            .collect();
        let specification = json!([{"ResourceType": "instance", "Tags": tags}]);
        args.push("--tag-specifications".to_string());
        args.push(specification.to_string());
    }
    args
}

fn build_instance_ids_args(ids: &[InstanceId]) -> Vec<String> {
    let mut args = vec!["--instance-ids".to_string()];
    args.extend(ids.iter().cloned());
    args
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

impl DescribeInstancesOutput {
    fn into_members(self) -> Vec<Member> {
        self.reservations
            .into_iter()
            .flat_map(|reservation| reservation.instances)
            .map(|instance| instance.into_member())
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Instance {
    instance_id: String,
    image_id: String,
    instance_type: String,
    state: Ec2InstanceState,
    public_ip_address: Option<String>,
    #[serde(default)]
    tags: Vec<Ec2Tag>,
}

impl Ec2Instance {
    fn into_member(self) -> Member {
        Member {
            id: self.instance_id,
            address: self.public_ip_address,
            state: InstanceState::from_provider(&self.state.name),
            image_id: self.image_id,
            instance_type: self.instance_type,
            tags: self
                .tags
                .into_iter()
                .map(|tag| (tag.key, tag.value))
                .collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2InstanceState {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Tag {
    key: String,
    value: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstancesOutput {
    #[serde(default)]
    instances: Vec<RunInstance>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RunInstance {
    instance_id: String,
}

fn parse_describe_instances(output: &str) -> ProviderResult<Vec<Member>> {
    let output: DescribeInstancesOutput = serde_json::from_str(output)?;
    Ok(output.into_members())
}

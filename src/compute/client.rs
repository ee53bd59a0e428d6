//! Compute-instance client over the query protocol

use crate::client::{xml, ClientBinding, QueryClient, QueryParams, ResourceFamily};
use crate::compute::api::{ComputeApi, InstanceDescription, KeyPair, LaunchSpec};
use crate::error::{ConfigError, RequestError, Result};
use async_trait::async_trait;
use hyper::StatusCode;

/// Query API version the requests are written against
pub const EC2_API_VERSION: &str = "2016-11-15";

const INSTANCE_PATH: &[&str] = &["reservationSet", "item", "instancesSet", "item"];

pub struct Ec2Client {
    query: QueryClient,
}

impl Ec2Client {
    pub fn from_binding(binding: ClientBinding) -> std::result::Result<Self, ConfigError> {
        let (endpoint, transport) = binding.into_transport(ResourceFamily::Compute)?;
        Ok(Self {
            query: QueryClient::new(endpoint, EC2_API_VERSION, transport),
        })
    }

    fn instance_params(instance_id: &str) -> QueryParams {
        QueryParams::new().with("InstanceId.1", instance_id)
    }

    fn run_instances_params(spec: &LaunchSpec) -> QueryParams {
        let mut params = QueryParams::new();
        params
            .push("ImageId", spec.image_id.as_str())
            .push("InstanceType", spec.instance_type.as_str())
            .push("MinCount", spec.min_count.to_string())
            .push("MaxCount", spec.max_count.to_string());
        if let Some(key_name) = &spec.key_name {
            params.push("KeyName", key_name.as_str());
        }
        params.push_list("SecurityGroupId", &spec.security_group_ids);
        if !spec.tags.is_empty() {
            params.push("TagSpecification.1.ResourceType", "instance");
            for (i, (key, value)) in spec.tags.iter().enumerate() {
                params
                    .push(format!("TagSpecification.1.Tag.{}.Key", i + 1), key.as_str())
                    .push(format!("TagSpecification.1.Tag.{}.Value", i + 1), value.as_str());
            }
        }
        params
    }

    fn parse_instance(body: &[u8], instance_id: &str) -> Result<InstanceDescription> {
        let field = |name: &str| -> Result<Option<String>> {
            let mut path: Vec<&str> = INSTANCE_PATH.to_vec();
            path.extend(name.split('/'));
            xml::first_text_at(body, &path)
        };

        let Some(found_id) = field("instanceId")? else {
            return Err(RequestError::service(
                StatusCode::BAD_REQUEST,
                "InvalidInstanceID.NotFound",
                format!("The instance ID '{}' does not exist", instance_id),
            ));
        };

        Ok(InstanceDescription {
            instance_id: found_id,
            image_id: field("imageId")?,
            instance_type: field("instanceType")?,
            state: field("instanceState/name")?,
            key_name: field("keyName")?,
            private_ip: field("privateIpAddress")?,
            public_ip: field("ipAddress")?,
            launch_time: field("launchTime")?,
            availability_zone: field("placement/availabilityZone")?,
        })
    }
}

#[async_trait]
impl ComputeApi for Ec2Client {
    async fn run_instances(&self, spec: &LaunchSpec) -> Result<Vec<String>> {
        let body = self
            .query
            .call("RunInstances", &Self::run_instances_params(spec))
            .await?;
        xml::texts_at(&body, &["instancesSet", "item", "instanceId"])
    }

    async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        self.query
            .call("StopInstances", &Self::instance_params(instance_id))
            .await?;
        Ok(())
    }

    async fn start_instance(&self, instance_id: &str) -> Result<()> {
        self.query
            .call("StartInstances", &Self::instance_params(instance_id))
            .await?;
        Ok(())
    }

    async fn reboot_instance(&self, instance_id: &str) -> Result<()> {
        self.query
            .call("RebootInstances", &Self::instance_params(instance_id))
            .await?;
        Ok(())
    }

    async fn terminate_instance(&self, instance_id: &str) -> Result<()> {
        self.query
            .call("TerminateInstances", &Self::instance_params(instance_id))
            .await?;
        Ok(())
    }

    async fn describe_instance(&self, instance_id: &str) -> Result<InstanceDescription> {
        let body = self
            .query
            .call("DescribeInstances", &Self::instance_params(instance_id))
            .await?;
        Self::parse_instance(&body, instance_id)
    }

    async fn describe_instance_status(&self, instance_id: &str) -> Result<Option<String>> {
        let params = Self::instance_params(instance_id).with("IncludeAllInstances", "true");
        let body = self.query.call("DescribeInstanceStatus", &params).await?;
        xml::first_text_at(
            &body,
            &["instanceStatusSet", "item", "instanceState", "name"],
        )
    }

    async fn create_image(
        &self,
        instance_id: &str,
        name: &str,
        description: &str,
        no_reboot: bool,
    ) -> Result<String> {
        let params = QueryParams::new()
            .with("InstanceId", instance_id)
            .with("Name", name)
            .with("Description", description)
            .with("NoReboot", no_reboot.to_string());
        let body = self.query.call("CreateImage", &params).await?;
        xml::first_text_at(&body, &["CreateImageResponse", "imageId"])?
            .ok_or_else(|| RequestError::InvalidResponse("CreateImage returned no imageId".into()))
    }

    async fn modify_instance_type(&self, instance_id: &str, instance_type: &str) -> Result<()> {
        let params = QueryParams::new()
            .with("InstanceId", instance_id)
            .with("InstanceType.Value", instance_type);
        self.query.call("ModifyInstanceAttribute", &params).await?;
        Ok(())
    }

    async fn attach_volume(&self, instance_id: &str, volume_id: &str, device: &str) -> Result<()> {
        let params = QueryParams::new()
            .with("Device", device)
            .with("InstanceId", instance_id)
            .with("VolumeId", volume_id);
        self.query.call("AttachVolume", &params).await?;
        Ok(())
    }

    async fn detach_volume(&self, instance_id: &str, volume_id: &str) -> Result<()> {
        let params = QueryParams::new()
            .with("InstanceId", instance_id)
            .with("VolumeId", volume_id);
        self.query.call("DetachVolume", &params).await?;
        Ok(())
    }

    async fn create_key_pair(&self, name: &str) -> Result<KeyPair> {
        let body = self
            .query
            .call("CreateKeyPair", &QueryParams::new().with("KeyName", name))
            .await?;

        let text = |tag: &str| xml::first_text_at(&body, &["CreateKeyPairResponse", tag]);
        let material = text("keyMaterial")?.ok_or_else(|| {
            RequestError::InvalidResponse("CreateKeyPair returned no key material".into())
        })?;

        Ok(KeyPair {
            name: text("keyName")?.unwrap_or_else(|| name.to_string()),
            fingerprint: text("keyFingerprint")?.unwrap_or_default(),
            material,
        })
    }

    async fn delete_key_pair(&self, name: &str) -> Result<()> {
        self.query
            .call("DeleteKeyPair", &QueryParams::new().with("KeyName", name))
            .await?;
        Ok(())
    }

    async fn describe_key_pairs(&self) -> Result<Vec<String>> {
        let body = self
            .query
            .call("DescribeKeyPairs", &QueryParams::new())
            .await?;
        xml::texts_at(&body, &["keySet", "item", "keyName"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_instances_params() {
        let spec = LaunchSpec::new("ami-123", "t3.micro")
            .key_name("ops")
            .security_group("sg-1")
            .security_group("sg-2")
            .tag("Name", "web");

        let params = Ec2Client::run_instances_params(&spec);
        assert_eq!(params.get("MinCount"), Some("1"));
        assert_eq!(params.get("KeyName"), Some("ops"));
        assert_eq!(params.get("SecurityGroupId.2"), Some("sg-2"));
        assert_eq!(params.get("TagSpecification.1.ResourceType"), Some("instance"));
        assert_eq!(params.get("TagSpecification.1.Tag.1.Value"), Some("web"));
    }

    #[test]
    fn test_run_instances_params_without_optional_fields() {
        let params = Ec2Client::run_instances_params(&LaunchSpec::new("ami-1", "t3.nano"));
        assert_eq!(params.get("KeyName"), None);
        assert_eq!(params.get("TagSpecification.1.ResourceType"), None);
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn test_parse_instance() {
        let xml = br#"<DescribeInstancesResponse xmlns="http://ec2.amazonaws.com/doc/2016-11-15/">
  <reservationSet>
    <item>
      <reservationId>r-1</reservationId>
      <instancesSet>
        <item>
          <instanceId>i-0abc</instanceId>
          <imageId>ami-123</imageId>
          <instanceState><code>16</code><name>running</name></instanceState>
          <instanceType>t3.micro</instanceType>
          <placement><availabilityZone>eu-west-1a</availabilityZone></placement>
          <privateIpAddress>10.0.0.5</privateIpAddress>
          <networkInterfaceSet>
            <item><privateIpAddress>10.0.0.99</privateIpAddress></item>
          </networkInterfaceSet>
        </item>
      </instancesSet>
    </item>
  </reservationSet>
</DescribeInstancesResponse>"#;

        let desc = Ec2Client::parse_instance(xml, "i-0abc").unwrap();
        assert_eq!(desc.instance_id, "i-0abc");
        assert_eq!(desc.state.as_deref(), Some("running"));
        assert_eq!(desc.private_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(desc.availability_zone.as_deref(), Some("eu-west-1a"));
        assert_eq!(desc.public_ip, None);
    }

    #[test]
    fn test_parse_empty_reservation_is_not_found() {
        let xml = br#"<DescribeInstancesResponse><reservationSet/></DescribeInstancesResponse>"#;
        let err = Ec2Client::parse_instance(xml, "i-gone").unwrap_err();
        assert!(err.is_not_found());
    }
}

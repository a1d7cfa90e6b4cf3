use serde_json::{Value, json};

use domain::protocol::{ImageMemory, InputSource, LensMemory, PictureLevel, PictureSetting};
use domain::{Capability, ProjectorId, TopicMap};

use super::payload::{OFF, OFFLINE, ON, ONLINE};

/// One retained Home Assistant discovery document
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryDocument {
    pub topic: String,
    pub config: Value,
}

/// Entity configs for one projector under `prefix`.
///
/// Entities are available only while both the projector and the bridge
/// report `online`, so a crashed bridge (last will) takes them all down.
pub fn discovery_documents(
    prefix: &str,
    projector: &ProjectorId,
    topics: &TopicMap,
) -> Vec<DiscoveryDocument> {
    let prefix = prefix.trim_end_matches('/');
    let node = projector.as_str();
    let device = json!({
        "identifiers": [format!("epson_{}", node)],
        "name": node,
        "manufacturer": "Epson",
    });
    let availability = json!([
        {
            "topic": topics.availability_topic(),
            "payload_available": ONLINE,
            "payload_not_available": OFFLINE,
        },
        {
            "topic": topics.bridge_status_topic(),
            "payload_available": ONLINE,
            "payload_not_available": OFFLINE,
        },
    ]);

    let entity = |component: &str, object: &str, name: &str, mut config: Value| {
        if let Some(fields) = config.as_object_mut() {
            fields.insert("name".into(), json!(name));
            fields.insert("unique_id".into(), json!(format!("{}_{}", node, object)));
            fields.insert("availability".into(), availability.clone());
            fields.insert("availability_mode".into(), json!("all"));
            fields.insert("device".into(), device.clone());
        }
        DiscoveryDocument {
            topic: format!("{}/{}/{}/{}/config", prefix, component, node, object),
            config,
        }
    };

    let mut documents = vec![
        entity(
            "switch",
            "power",
            "Power",
            json!({
                "command_topic": topics.command_topic(Capability::Power),
                "state_topic": topics.state_topic(Capability::Power),
                "payload_on": ON,
                "payload_off": OFF,
                "state_on": ON,
                "state_off": OFF,
            }),
        ),
        entity(
            "switch",
            "mute",
            "A/V Mute",
            json!({
                "command_topic": topics.command_topic(Capability::Mute),
                "state_topic": topics.state_topic(Capability::Mute),
                "payload_on": ON,
                "payload_off": OFF,
                "state_on": ON,
                "state_off": OFF,
            }),
        ),
        entity(
            "select",
            "input",
            "Input Source",
            json!({
                "command_topic": topics.command_topic(Capability::Input),
                "state_topic": topics.state_topic(Capability::Input),
                "options": InputSource::NAMED.iter().map(|s| s.name()).collect::<Vec<_>>(),
            }),
        ),
        entity(
            "sensor",
            "lamp_hours",
            "Lamp Hours",
            json!({
                "state_topic": topics.state_topic(Capability::LampHours),
                "unit_of_measurement": "h",
                "state_class": "total_increasing",
            }),
        ),
        entity(
            "sensor",
            "error",
            "Error",
            json!({
                "state_topic": topics.state_topic(Capability::Error),
            }),
        ),
    ];

    for setting in PictureSetting::ALL {
        let capability = Capability::Picture(setting);
        documents.push(entity(
            "number",
            setting.as_str(),
            setting.label(),
            json!({
                "command_topic": topics.command_topic(capability),
                "state_topic": topics.state_topic(capability),
                "min": 0,
                "max": PictureLevel::MAX,
                "step": 1,
                "unit_of_measurement": "%",
            }),
        ));
    }

    for slot in LensMemory::MIN..=LensMemory::MAX {
        documents.push(entity(
            "button",
            &format!("lens_memory_{}", slot),
            &format!("Load Lens Memory #{}", slot),
            json!({
                "command_topic": topics.command_topic(Capability::LensMemory),
                "payload_press": slot.to_string(),
            }),
        ));
    }

    for slot in ImageMemory::MIN..=ImageMemory::MAX {
        documents.push(entity(
            "button",
            &format!("image_memory_{}", slot),
            &format!("Load Image Memory #{}", slot),
            json!({
                "command_topic": topics.command_topic(Capability::ImageMemory),
                "payload_press": slot.to_string(),
            }),
        ));
    }

    documents
}

//! Shared test fixtures: one node running two pods
//!
//! `speaker-cpxhz` has limits, two containers and one volume.
//! `coredns-7db6d` has no limits, no CPU stats, and a crash-looping container.

use crate::stats::Summary;
use k8s_openapi::api::core::v1::{Node, Pod};
use serde_json::json;

pub const NODE_NAME: &str = "worker-1";
pub const SPEAKER_UID: &str = "5997ad9b-1d2a-43cf-ab57-a98d8796dc34";
pub const COREDNS_UID: &str = "c0beb6af-9b87-4e0d-a143-936c9ab7f63b";

pub fn nodes() -> Vec<Node> {
    vec![serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Node",
        "metadata": {
            "name": NODE_NAME,
            "labels": {
                "kubernetes.io/hostname": NODE_NAME,
                "kubernetes.io/os": "linux",
                "kubernetes.io/arch": "amd64",
                "node.kubernetes.io/instance-type": "m5.large",
                "topology.kubernetes.io/region": "us-east-1",
                "topology.kubernetes.io/zone": "us-east-1a",
                "app": "node-app"
            }
        },
        "status": {
            "allocatable": {"cpu": "4", "memory": "16Gi", "pods": "110"}
        }
    }))
    .unwrap()]
}

pub fn pods() -> Vec<Pod> {
    vec![
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "speaker-cpxhz",
                "namespace": "metallb-system",
                "uid": SPEAKER_UID,
                "labels": {
                    "app": "metallb",
                    "component": "speaker",
                    "controller-revision-hash": "7c6d9b8f4",
                    "pod-template-generation": "1"
                }
            },
            "spec": {
                "nodeName": NODE_NAME,
                "containers": [
                    {
                        "name": "speaker",
                        "resources": {"limits": {"cpu": "100m", "memory": "100Mi"}}
                    },
                    {
                        "name": "frr",
                        "resources": {"limits": {"cpu": "200m", "memory": "1Gi"}}
                    }
                ]
            },
            "status": {
                "phase": "Running",
                "qosClass": "Burstable",
                "conditions": [
                    {"type": "Initialized", "status": "True"},
                    {"type": "Ready", "status": "True"}
                ],
                "containerStatuses": [
                    {
                        "name": "speaker",
                        "image": "metallb/speaker:v0.14",
                        "imageID": "",
                        "ready": true,
                        "restartCount": 54,
                        "state": {"running": {"startedAt": "2024-01-10T08:00:00Z"}}
                    },
                    {
                        "name": "frr",
                        "image": "frrouting/frr:v8",
                        "imageID": "",
                        "ready": true,
                        "restartCount": 1,
                        "state": {"running": {"startedAt": "2024-01-10T08:00:00Z"}}
                    }
                ]
            }
        }))
        .unwrap(),
        serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": "coredns-7db6d",
                "namespace": "kube-system",
                "uid": COREDNS_UID,
                "labels": {"k8s-app": "kube-dns", "pod-template-hash": "7db6d"}
            },
            "spec": {
                "nodeName": NODE_NAME,
                "containers": [{"name": "coredns"}]
            },
            "status": {
                "phase": "Running",
                "qosClass": "BestEffort",
                "conditions": [{"type": "Ready", "status": "False"}],
                "containerStatuses": [{
                    "name": "coredns",
                    "image": "coredns/coredns:1.11",
                    "imageID": "",
                    "ready": false,
                    "restartCount": 3,
                    "state": {"waiting": {"reason": "CrashLoopBackOff"}}
                }]
            }
        }))
        .unwrap(),
    ]
}

pub fn summary() -> Summary {
    serde_json::from_value(json!({
        "node": {
            "nodeName": NODE_NAME,
            "cpu": {"usageNanoCores": 388954406u64, "usageCoreNanoSeconds": 9000000000000u64},
            "memory": {
                "availableBytes": 15000000000u64,
                "usageBytes": 2500000000u64,
                "workingSetBytes": 2000000000u64,
                "rssBytes": 1500000000u64,
                "pageFaults": 1000u64,
                "majorPageFaults": 10u64
            },
            "network": {
                "name": "eth0",
                "rxBytes": 900000u64,
                "rxErrors": 0u64,
                "txBytes": 800000u64,
                "txErrors": 0u64
            }
        },
        "pods": [
            {
                "podRef": {"name": "speaker-cpxhz", "namespace": "metallb-system", "uid": SPEAKER_UID},
                "cpu": {"usageNanoCores": 7919180u64},
                "memory": {
                    "availableBytes": 4202496u64,
                    "usageBytes": 2143281152u64,
                    "workingSetBytes": 2100068352u64,
                    "rssBytes": 23191552u64,
                    "pageFaults": 5000u64,
                    "majorPageFaults": 3u64
                },
                "network": {
                    "name": "eth0",
                    "rxBytes": 150353577u64,
                    "rxErrors": 0u64,
                    "txBytes": 94352300u64,
                    "txErrors": 0u64
                },
                "containers": [
                    {
                        "name": "speaker",
                        "cpu": {"usageNanoCores": 13107067u64},
                        "memory": {"usageBytes": 20971520u64, "workingSetBytes": 10485760u64}
                    },
                    {
                        "name": "frr",
                        "cpu": {"usageNanoCores": 2000000u64},
                        "memory": {"usageBytes": 52428800u64, "workingSetBytes": 41943040u64}
                    }
                ],
                "volume": [{
                    "name": "speaker-token-kpzds",
                    "availableBytes": 4182040576u64,
                    "capacityBytes": 4182052864u64,
                    "usedBytes": 12288u64,
                    "inodesFree": 1021000u64,
                    "inodes": 1021009u64,
                    "inodesUsed": 9u64
                }]
            },
            {
                "podRef": {"name": "coredns-7db6d", "namespace": "kube-system", "uid": COREDNS_UID},
                "memory": {"usageBytes": 30000000u64, "workingSetBytes": 25000000u64},
                "containers": [{"name": "coredns"}],
                "volume": []
            }
        ]
    }))
    .unwrap()
}

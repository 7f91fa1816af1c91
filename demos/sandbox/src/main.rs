// Copyright 2025 eraflo
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

// Tessera Sandbox
// Headless demo: an instanced car whose wheels share one scene node.

use std::sync::Arc;

use anyhow::{Context, Result};
use tessera_core::event::{ChangeEvent, ChangeFeed, NodeId};
use tessera_core::settings::StreamSettings;
use tessera_data::{ContainerId, ParameterLayout, TransformIndex, TransformTree};
use tessera_infra::graphics::HostDevice;
use tessera_lanes::render_lane::FrameDriver;
use tessera_lanes::scene_lane::{
    transform_observer, ColumnMajor, TransformBinding, TransformSync, IDENTITY,
};

const FRAMES: u32 = 6;
const WHEELS: usize = 4;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Tint {
    color: [f32; 4],
}

fn translation(x: f32, y: f32, z: f32) -> ColumnMajor {
    let mut m = IDENTITY;
    m[12] = x;
    m[13] = y;
    m[14] = z;
    m
}

fn load_settings() -> Result<StreamSettings> {
    match std::env::args().nth(1) {
        Some(path) => StreamSettings::from_file(&path)
            .with_context(|| format!("failed to load settings from {path}")),
        None => Ok(StreamSettings {
            label: "Sandbox Parameters".to_string(),
            batching: true,
            device_count: 2,
            ..Default::default()
        }),
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let settings = load_settings()?;
    let device = Arc::new(HostDevice::new(settings.device_count));
    let mut driver = FrameDriver::new(device.clone(), &settings)?;

    // --- Scene: one car body, one wheel node instanced four times ---
    let car_node = NodeId::new(0, 0);
    let wheel_node = NodeId::new(1, 0);

    let mut tree = TransformTree::new();
    let body = tree.allocate();
    let wheels: Vec<TransformIndex> = (0..WHEELS)
        .map(|_| tree.allocate_child(body))
        .collect::<Result<_, _>>()?;

    let layout = ParameterLayout::builder("Instance")
        .entry("world", 64)
        .entry("tint", 16)
        .build();
    let world = layout.entry_id("world").context("layout has a world entry")?;
    let tint = layout.entry_id("tint").context("layout has a tint entry")?;

    let mut sync = TransformSync::new();
    let mut containers: Vec<ContainerId> = Vec::with_capacity(WHEELS);
    for &slot in &wheels {
        let container = driver.cache_mut().register_container(&layout)?;
        sync.bind(slot, TransformBinding { container, entry: world });
        containers.push(container);
    }

    let mut feed = ChangeFeed::new();
    let receiver = feed.subscribe();
    let mut observer = transform_observer(tree.capacity());
    observer.attach(car_node, body)?;
    for &slot in &wheels {
        observer.attach(wheel_node, slot)?;
    }

    // Every slot starts stale.
    observer.notify(car_node, &ChangeEvent::transform());

    for frame in 0..FRAMES {
        let car_x = frame as f32 * 0.5;
        match frame {
            1 | 2 | 4 => {
                feed.publish(car_node, ChangeEvent::transform());
            }
            3 => {
                let red = Tint {
                    color: [1.0, 0.0, 0.0, 1.0],
                };
                driver.cache_mut().set_entry_pod(containers[0], tint, &red)?;
            }
            5 if settings.is_multicast() => {
                driver.renderer_mut().set_device_enabled(1, false)?;
                feed.publish(wheel_node, ChangeEvent::transform());
            }
            _ => {}
        }
        receiver.dispatch_into(&mut observer);

        let local = |slot: TransformIndex| -> ColumnMajor {
            if slot == body {
                translation(car_x, 0.0, 0.0)
            } else {
                let i = slot.0 as f32 - 1.0;
                translation(if i < 2.0 { -1.0 } else { 1.0 }, -0.5, i % 2.0)
            }
        };
        let recomputed = sync.sync(
            &tree,
            observer.handler_mut().dirty_mut(),
            driver.cache_mut(),
            local,
        )?;

        driver.begin_frame()?;
        let report = driver.flush_dirty()?;
        driver.render(&containers)?;

        log::info!(
            "Frame {}: {} transforms recomputed, {} entries in {} writes ({} bytes), devices {:?}.",
            frame,
            recomputed,
            report.entries,
            report.descriptors,
            report.bytes,
            driver.renderer().device_mask()
        );
    }

    let stats = driver.renderer().stats();
    log::info!(
        "Done: {} descriptors, {} device calls, {} bytes over {} flushes.",
        stats.descriptors,
        stats.device_calls,
        stats.bytes,
        stats.flushes
    );
    Ok(())
}

//! End-to-end frame-loop tests: touch input through gesture routing,
//! message ordering, relayout and render-instruction reuse across frames.

use std::cell::Cell;
use std::rc::Rc;

use scena::core::{Core, Scene};
use scena::gestures::{GestureState, PanGestureDetector, PointState, TouchEvent, TouchPoint};
use scena::math::{Vector2, Vector3};
use scena::node::NodeId;
use scena::relayout::{Dimension, ResizePolicy};
use scena::rendering::Renderer;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn touch(time: u32, state: PointState, x: f32, y: f32) -> TouchEvent {
    TouchEvent::with_point(time, TouchPoint::new(1, state, Vector2::new(x, y)))
}

fn add_actor(core: &mut Core, x: f32, y: f32, w: f32, h: f32) -> NodeId {
    let node = core.scene_mut().nodes.create_node();
    let n = core.scene_mut().nodes.get_mut(node).unwrap();
    n.position.set(0, Vector3::new(x, y, 0.0));
    n.size.set(0, Vector3::new(w, h, 0.0));
    node
}

#[test]
fn pan_gesture_fires_once_through_the_frame_loop() {
    init_logging();
    let mut core = Core::new(Vector2::new(480.0, 800.0));
    let actor = add_actor(&mut core, 0.0, 0.0, 100.0, 100.0);

    let fired = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&fired);
    let mut detector = PanGestureDetector::new(Box::new(move |_, gesture| {
        if gesture.state == GestureState::Started {
            counter.set(counter.get() + 1);
        }
    }));
    detector.attach(actor);
    core.scene_mut().gestures.add_pan_detector(detector);

    core.feed_touch(touch(150, PointState::Down, 20.0, 20.0));
    core.feed_touch(touch(151, PointState::Motion, 20.0, 40.0));
    core.feed_touch(touch(152, PointState::Motion, 20.0, 60.0));
    core.update(160);

    assert_eq!(fired.get(), 1);
}

#[test]
fn interrupted_pan_never_reaches_the_detector() {
    init_logging();
    let mut core = Core::new(Vector2::new(480.0, 800.0));
    let actor = add_actor(&mut core, 0.0, 0.0, 100.0, 100.0);

    let fired = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&fired);
    let mut detector = PanGestureDetector::new(Box::new(move |_, gesture| {
        if gesture.state == GestureState::Started {
            counter.set(counter.get() + 1);
        }
    }));
    detector.attach(actor);
    core.scene_mut().gestures.add_pan_detector(detector);

    core.feed_touch(touch(150, PointState::Down, 20.0, 20.0));
    core.feed_touch(touch(151, PointState::Motion, 20.0, 25.0));
    core.feed_touch(touch(152, PointState::Interrupted, 20.0, 30.0));
    core.update(160);

    assert_eq!(fired.get(), 0);
}

#[test]
fn queued_message_is_visible_to_the_next_frame() {
    init_logging();
    let mut core = Core::new(Vector2::new(480.0, 800.0));
    let node = core.scene_mut().nodes.create_node();

    let sender = core.message_sender();
    sender.send(Box::new(move |scene: &mut Scene| {
        if let Some(n) = scene.nodes.get_mut(node) {
            n.position.set(0, Vector3::new(42.0, 0.0, 0.0));
        }
    }));

    // Not applied until the update runs.
    assert_eq!(core.scene().nodes.get(node).unwrap().position.get(0).x, 0.0);

    core.update(16);
    assert_eq!(core.scene().nodes.get(node).unwrap().position.get(0).x, 42.0);
}

#[test]
fn relayout_request_resolves_during_update() {
    init_logging();
    let mut core = Core::new(Vector2::new(480.0, 800.0));
    let node = core.scene_mut().nodes.create_node();
    {
        let n = core.scene_mut().nodes.get_mut(node).unwrap();
        n.relayout
            .set_policy(ResizePolicy::FillToParent, Dimension::Width);
        n.relayout
            .set_policy(ResizePolicy::FillToParent, Dimension::Height);
    }

    let scene = core.scene_mut();
    scene.relayout.request_relayout(&scene.nodes, node);
    core.update(16);

    // A root filling its parent takes the scene size.
    let size = *core.scene().nodes.get(node).unwrap().size.get(0);
    assert_eq!(size.x, 480.0);
    assert_eq!(size.y, 800.0);
}

#[test]
fn static_scene_reuses_render_lists_on_the_second_frame() {
    init_logging();
    let mut core = Core::new(Vector2::new(480.0, 800.0));
    let actor = add_actor(&mut core, 0.0, 0.0, 100.0, 100.0);
    let renderer = core.scene_mut().renderers.insert(Renderer::new());
    core.scene_mut()
        .nodes
        .get_mut(actor)
        .unwrap()
        .renderers
        .push(renderer);
    core.scene_mut().layers[0].add_member(actor);

    core.update(16);
    assert_eq!(core.render_instruction().lists().len(), 1);
    assert!(!core.render_instruction().lists()[0].was_reused());

    core.update(33);
    assert!(
        core.render_instruction().lists()[0].was_reused(),
        "unchanged layer and view matrix must reuse the cached list"
    );

    // Touching the layer membership defeats reuse again.
    let other = add_actor(&mut core, 10.0, 10.0, 20.0, 20.0);
    let r2 = core.scene_mut().renderers.insert(Renderer::new());
    core.scene_mut()
        .nodes
        .get_mut(other)
        .unwrap()
        .renderers
        .push(r2);
    core.scene_mut().layers[0].add_member(other);

    core.update(49);
    assert!(!core.render_instruction().lists()[0].was_reused());
}

#[test]
fn removed_actor_stops_receiving_gestures() {
    init_logging();
    let mut core = Core::new(Vector2::new(480.0, 800.0));
    let actor = add_actor(&mut core, 0.0, 0.0, 100.0, 100.0);

    let fired = Rc::new(Cell::new(0u32));
    let counter = Rc::clone(&fired);
    let mut detector = PanGestureDetector::new(Box::new(move |_, _| {
        counter.set(counter.get() + 1);
    }));
    detector.attach(actor);
    core.scene_mut().gestures.add_pan_detector(detector);

    core.feed_touch(touch(150, PointState::Down, 20.0, 20.0));
    core.feed_touch(touch(151, PointState::Motion, 20.0, 40.0));
    core.feed_touch(touch(152, PointState::Motion, 20.0, 60.0));
    core.update(160);
    let calls_before = fired.get();
    assert!(calls_before > 0);

    core.scene_mut().nodes.schedule_removal(actor);
    core.scene_mut().gestures.node_removed(actor);
    core.update(176);

    core.feed_touch(touch(200, PointState::Motion, 20.0, 80.0));
    core.feed_touch(touch(201, PointState::Up, 20.0, 90.0));
    core.update(210);

    assert_eq!(fired.get(), calls_before, "no events after removal");
}
